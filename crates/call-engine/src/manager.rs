//! # Call Mode Manager
//!
//! Keeps its own copy of every live call and, after each change, derives the
//! single global [`CallMode`]. The decision then drives the audio route, the
//! ringtone and the vibrator through the pipes.
//!
//! ## Mode Priority
//!
//! | Live calls | Mode |
//! |---|---|
//! | any Active/Dialing/Alerting call that needs the voice path | `InCall` |
//! | otherwise any Active/Dialing/Alerting call | `InCallNoRoute` |
//! | otherwise any Incoming call | `Ringing` |
//! | nothing of the above | `NoCall` |
//!
//! ## Side Effects
//!
//! - entering a call mode routes audio to the handset unless a headset is
//!   connected; vibration is stopped and running playback is stopped
//! - `Ringing` vibrates when vibration is enabled and, when the ringer is
//!   enabled, routes to the speaker (unless headset) and loops the ringtone
//! - `NoCall` moves a handset route back to the speaker, stops vibration and
//!   stops running playback
//!
//! Re-routing on entering a call mode happens only when the mode differs
//! from the one this manager published last, so a second call joining an
//! ongoing one does not flip the route again.

use chrono::Utc;
use commbus_comm_core::{
    AudioRoute, Call, CallKey, CallMode, CallState, CommContext, Message, VibrateKind,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Live-call bookkeeping of the classification pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Classification {
    in_call: bool,
    in_call_no_route: bool,
    incoming: bool,
}

impl Classification {
    fn target_mode(self) -> CallMode {
        if self.in_call {
            CallMode::InCall
        } else if self.in_call_no_route {
            CallMode::InCallNoRoute
        } else if self.incoming {
            CallMode::Ringing
        } else {
            CallMode::NoCall
        }
    }
}

/// The call-state arbitration engine
pub struct CallModeManager {
    ctx: Arc<CommContext>,
    calls: DashMap<CallKey, Call>,
    mode: Mutex<CallMode>,
}

impl CallModeManager {
    pub fn new(ctx: Arc<CommContext>) -> Self {
        Self {
            ctx,
            calls: DashMap::new(),
            mode: Mutex::new(CallMode::NoCall),
        }
    }

    /// Track a new call. A call with an already known identity replaces the
    /// tracked copy.
    pub fn on_call_new(&self, call: &Call) {
        debug!("New call {} in state {}", call.key(), call.state);
        if call.state == CallState::Disconnected {
            self.calls.remove(&call.key());
        } else if self.calls.insert(call.key(), call.clone()).is_some() {
            debug!("Call {} was already tracked, replaced", call.key());
        }
        self.check_needed_state();
    }

    /// Apply a state change to the tracked copy. Only `state` is taken over;
    /// a call reaching `Disconnected` stops being tracked.
    pub fn on_call_changed(&self, call: &Call) {
        let key = call.key();
        let disconnected = match self.calls.get_mut(&key) {
            Some(mut tracked) => {
                debug!("Call {} changed {} -> {}", key, tracked.state, call.state);
                tracked.state = call.state;
                call.state == CallState::Disconnected
            }
            None => {
                debug!("Change for untracked call {} ignored", key);
                false
            }
        };

        if disconnected {
            if let Some((_, gone)) = self.calls.remove(&key) {
                match gone.start_time {
                    Some(start) => info!(
                        "Call {} ended after {}s",
                        key,
                        (Utc::now() - start).num_seconds()
                    ),
                    None => info!("Call {} ended", key),
                }
            }
        }
        self.check_needed_state();
    }

    fn classify(&self) -> Classification {
        let mut result = Classification::default();
        for entry in self.calls.iter() {
            let call = entry.value();
            debug!("call {} state {}", call.line_identifier, call.state);
            if call.state == CallState::Incoming {
                result.incoming = true;
            } else if call.state.wants_route() && call.needs_route {
                result.in_call = true;
            } else if call.state.wants_route() {
                result.in_call_no_route = true;
            }
        }
        result
    }

    /// Recompute the global mode from the live calls and drive the pipes
    pub fn check_needed_state(&self) {
        let pipes = &self.ctx.pipes;
        let classification = self.classify();
        let target = classification.target_mode();
        let route = pipes.current_route();
        let playing = pipes.audio_playing_now();

        // Record before publishing so nested recomputes see the new mode
        let previous = std::mem::replace(&mut *self.mode.lock(), target);
        debug!(
            "Mode {:?} -> {:?} (route {:?}, playing {})",
            previous, target, route, playing
        );

        match target {
            CallMode::InCall | CallMode::InCallNoRoute => {
                if previous != target {
                    info!("Entering {:?}", target);
                    pipes.call_mode.publish(target);
                    if route != AudioRoute::Headset {
                        pipes.audio_route.publish(AudioRoute::Handset);
                    }
                }
                if playing {
                    pipes.audio_stop.publish(());
                }
                pipes.vibrate.publish(VibrateKind::Stop);
            }
            CallMode::Ringing => {
                pipes.call_mode.publish(CallMode::Ringing);
                if self.ctx.rtconf.vibration_enabled() {
                    pipes.vibrate.publish(VibrateKind::Call);
                }
                if self.ctx.rtconf.ringer_enabled() {
                    if route != AudioRoute::Headset {
                        pipes.audio_route.publish(AudioRoute::Speaker);
                    }
                    match self.ctx.rtconf.call_sound_path() {
                        Some(path) => {
                            pipes.audio_play_looping.publish(path);
                        }
                        None => debug!("No ringtone configured"),
                    }
                }
            }
            CallMode::NoCall => {
                pipes.call_mode.publish(CallMode::NoCall);
                if route == AudioRoute::Handset {
                    pipes.audio_route.publish(AudioRoute::Speaker);
                }
                pipes.vibrate.publish(VibrateKind::Stop);
                if playing {
                    pipes.audio_stop.publish(());
                }
            }
        }
    }

    /// Alert the user about an incoming message unless its thread is on screen
    pub fn on_message_received(&self, message: &Message) {
        if message.outbound {
            return;
        }
        let contact = message.contact_or_line();
        if self.ctx.ui.thread_shown(&contact) {
            debug!("Thread of {} is shown, no alert", contact.display_name());
            return;
        }

        let pipes = &self.ctx.pipes;
        if !pipes.audio_playing_now() && self.ctx.rtconf.ringer_enabled() {
            if let Some(path) = self.ctx.rtconf.sms_sound_path() {
                pipes.audio_play_once.publish(path);
            }
        }
        if self.ctx.rtconf.vibration_enabled() {
            pipes.vibrate.publish(VibrateKind::Message);
        }
    }

    /// The mode this manager published last
    pub fn mode(&self) -> CallMode {
        *self.mode.lock()
    }

    /// Copies of the tracked calls
    pub fn live_calls(&self) -> Vec<Call> {
        self.calls.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn is_tracking(&self, key: &CallKey) -> bool {
        self.calls.contains_key(key)
    }
}
