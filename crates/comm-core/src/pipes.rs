//! # Datapipes
//!
//! The fixed set of named pipes every component talks through. A
//! [`Datapipes`] value is created once at startup and shared (`Arc`) by the
//! registries and all modules.
//!
//! | Pipe | Payload | Typical producer | Typical consumer |
//! |---|---|---|---|
//! | `call_new` | [`Call`] | backend drivers | GUI, storage, notifier, manager |
//! | `call_properties_changed` | [`Call`] | backend drivers | GUI, storage, notifier, manager |
//! | `call_dial`, `call_accept`, `call_hangup`, `call_hold` | [`Call`] | GUI | backend drivers |
//! | `call_mode` | [`CallMode`] | manager | audio routing, GUI |
//! | `call_backend_error` | `String` | backends, UI registry | error dialogs |
//! | `audio_route` | [`AudioRoute`] | manager, GUI | audio routing |
//! | `audio_play_once`, `audio_play_looping` | `PathBuf` | manager, options GUI | playback |
//! | `audio_stop` | `()` | manager | playback |
//! | `audio_playing` | `bool` (filter query) | playback | manager |
//! | `vibrate` | [`VibrateKind`] | manager | vibration |
//! | `message_send` | [`Message`] | GUI | backend drivers |
//! | `message_received` | [`Message`] | backend drivers | GUI, storage, notifier, manager |
//! | `contact_fill` | [`Contact`] (filter enrichment) | storage, GUI | contacts driver |
//! | `contact_show` | `Option<Contact>` | GUI | contact UI |
//! | `notification_raise` | [`Notification`] | any | notifier |
//! | `comm_backend_added`, `comm_backend_removed` | [`Backend`] | backend registry | GUI, storage |

use crate::backend::Backend;
use crate::types::{AudioRoute, Call, CallMode, Contact, Message, Notification, VibrateKind};
use commbus_infra_common::Pipe;
use std::path::PathBuf;
use tracing::debug;

pub struct Datapipes {
    pub call_new: Pipe<Call>,
    pub call_properties_changed: Pipe<Call>,
    pub call_dial: Pipe<Call>,
    pub call_accept: Pipe<Call>,
    pub call_hangup: Pipe<Call>,
    pub call_hold: Pipe<Call>,
    pub call_mode: Pipe<CallMode>,
    pub call_backend_error: Pipe<String>,

    pub audio_route: Pipe<AudioRoute>,
    pub audio_play_once: Pipe<PathBuf>,
    pub audio_play_looping: Pipe<PathBuf>,
    pub audio_stop: Pipe<()>,
    pub audio_playing: Pipe<bool>,

    pub vibrate: Pipe<VibrateKind>,

    pub message_send: Pipe<Message>,
    pub message_received: Pipe<Message>,

    pub contact_fill: Pipe<Contact>,
    pub contact_show: Pipe<Option<Contact>>,
    pub notification_raise: Pipe<Notification>,

    pub comm_backend_added: Pipe<Backend>,
    pub comm_backend_removed: Pipe<Backend>,
}

impl Datapipes {
    /// Create every pipe with empty filter and trigger lists
    pub fn new() -> Self {
        Self {
            call_new: Pipe::new("call_new"),
            call_properties_changed: Pipe::new("call_properties_changed"),
            call_dial: Pipe::new("call_dial"),
            call_accept: Pipe::new("call_accept"),
            call_hangup: Pipe::new("call_hangup"),
            call_hold: Pipe::new("call_hold"),
            call_mode: Pipe::new("call_mode"),
            call_backend_error: Pipe::new("call_backend_error"),
            audio_route: Pipe::new("audio_route"),
            audio_play_once: Pipe::new("audio_play_once"),
            audio_play_looping: Pipe::new("audio_play_looping"),
            audio_stop: Pipe::new("audio_stop"),
            audio_playing: Pipe::new("audio_playing"),
            vibrate: Pipe::new("vibrate"),
            message_send: Pipe::new("message_send"),
            message_received: Pipe::new("message_received"),
            contact_fill: Pipe::new("contact_fill"),
            contact_show: Pipe::new("contact_show"),
            notification_raise: Pipe::new("notification_raise"),
            comm_backend_added: Pipe::new("comm_backend_added"),
            comm_backend_removed: Pipe::new("comm_backend_removed"),
        }
    }

    /// Last delivered audio route, [`AudioRoute::Unknown`] before the first one
    pub fn current_route(&self) -> AudioRoute {
        self.audio_route.last_delivered().unwrap_or_default()
    }

    /// Last delivered call mode, [`CallMode::NoCall`] before the first one
    pub fn current_mode(&self) -> CallMode {
        self.call_mode.last_delivered().unwrap_or_default()
    }

    /// Ask the playback driver whether something is playing.
    ///
    /// Runs `false` through the `audio_playing` filters; a playback driver
    /// passes `true` while it plays. A dropped query counts as not playing.
    pub fn audio_playing_now(&self) -> bool {
        self.audio_playing.run_filters(false).unwrap_or(false)
    }

    /// Let contact drivers enrich a contact (e.g. fill in its display name)
    pub fn fill_contact(&self, contact: Contact) -> Contact {
        let fallback = contact.clone();
        self.contact_fill.run_filters(contact).unwrap_or(fallback)
    }

    /// Report an error to the user through the error pipe
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("Reporting error: {}", message);
        self.call_backend_error.publish(message);
    }

    /// Tear down every pipe; returns the number of registrations that were
    /// still attached, each of which has been logged.
    pub fn teardown(&self) -> usize {
        [
            self.call_new.teardown(),
            self.call_properties_changed.teardown(),
            self.call_dial.teardown(),
            self.call_accept.teardown(),
            self.call_hangup.teardown(),
            self.call_hold.teardown(),
            self.call_mode.teardown(),
            self.call_backend_error.teardown(),
            self.audio_route.teardown(),
            self.audio_play_once.teardown(),
            self.audio_play_looping.teardown(),
            self.audio_stop.teardown(),
            self.audio_playing.teardown(),
            self.vibrate.teardown(),
            self.message_send.teardown(),
            self.message_received.teardown(),
            self.contact_fill.teardown(),
            self.contact_show.teardown(),
            self.notification_raise.teardown(),
            self.comm_backend_added.teardown(),
            self.comm_backend_removed.teardown(),
        ]
        .into_iter()
        .sum()
    }
}

impl Default for Datapipes {
    fn default() -> Self {
        Self::new()
    }
}
