//! # Domain Model
//!
//! Payload types that flow through the datapipes. All of them are plain owned
//! values: a consumer that wants to keep a payload past the trigger call clones
//! it, nobody holds a pointer into another component's state.
//!
//! Identity rules:
//!
//! - two [`Call`]s are the same call when their backend and line identifier
//!   match ([`Call::same_call`], [`CallKey`])
//! - two [`Contact`]s are equal under the same rule
//! - [`Message`]s have no identity; they are only ever iterated

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a registered communication backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendId(pub u32);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a call as reported by its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    Dialing,
    Alerting,
    Incoming,
    Waiting,
    Active,
    Held,
    Disconnected,
    Invalid,
}

impl CallState {
    /// States in which a call occupies the voice path
    pub fn wants_route(self) -> bool {
        matches!(self, CallState::Active | CallState::Dialing | CallState::Alerting)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallState::Dialing => "Dialing",
            CallState::Alerting => "Alerting",
            CallState::Incoming => "Incoming",
            CallState::Waiting => "Waiting",
            CallState::Active => "Active",
            CallState::Held => "Held",
            CallState::Disconnected => "Disconnected",
            CallState::Invalid => "Invalid",
        };
        f.write_str(s)
    }
}

/// A party on the other end of a call or message thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Display name, filled in by a contacts driver when known
    pub name: Option<String>,
    pub line_identifier: String,
    pub backend: BackendId,
}

impl Contact {
    pub fn new(backend: BackendId, line_identifier: impl Into<String>) -> Self {
        Self {
            name: None,
            line_identifier: line_identifier.into(),
            backend,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if known, line identifier otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.line_identifier)
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.backend == other.backend && self.line_identifier == other.line_identifier
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backend.hash(state);
        self.line_identifier.hash(state);
    }
}

/// Identity of a call: `(backend, line_identifier)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallKey {
    pub backend: BackendId,
    pub line_identifier: String,
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.line_identifier, self.backend)
    }
}

/// A voice call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub contact: Option<Contact>,
    pub line_identifier: String,
    pub state: CallState,
    pub backend: BackendId,
    /// Backend-internal handle, e.g. a modem object path
    pub backend_data: Option<String>,
    /// Access technology reported by the backend ("gsm", "umts", "sip", ...)
    pub technology: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub emergency: bool,
    pub answered: bool,
    /// Whether the device voice path must be engaged for this call
    pub needs_route: bool,
    pub outbound: bool,
}

impl Call {
    pub fn new(backend: BackendId, line_identifier: impl Into<String>, state: CallState) -> Self {
        Self {
            contact: None,
            line_identifier: line_identifier.into(),
            state,
            backend,
            backend_data: None,
            technology: None,
            start_time: None,
            end_time: None,
            emergency: false,
            answered: false,
            needs_route: false,
            outbound: false,
        }
    }

    pub fn with_needs_route(mut self, needs_route: bool) -> Self {
        self.needs_route = needs_route;
        self
    }

    pub fn with_backend_data(mut self, data: impl Into<String>) -> Self {
        self.backend_data = Some(data.into());
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn outbound(mut self) -> Self {
        self.outbound = true;
        self
    }

    pub fn key(&self) -> CallKey {
        CallKey {
            backend: self.backend,
            line_identifier: self.line_identifier.clone(),
        }
    }

    /// Identity comparison; ignores backend data, timestamps and state
    pub fn same_call(&self, other: &Call) -> bool {
        self.backend == other.backend && self.line_identifier == other.line_identifier
    }

    /// The contact for this call, or a bare one built from the line identifier
    pub fn contact_or_line(&self) -> Contact {
        self.contact
            .clone()
            .unwrap_or_else(|| Contact::new(self.backend, self.line_identifier.clone()))
    }
}

/// A text message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub contact: Option<Contact>,
    pub line_identifier: String,
    pub text: String,
    pub backend: BackendId,
    pub backend_data: Option<String>,
    pub technology: Option<String>,
    pub time: DateTime<Utc>,
    pub outbound: bool,
}

impl Message {
    pub fn new(backend: BackendId, line_identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            contact: None,
            line_identifier: line_identifier.into(),
            text: text.into(),
            backend,
            backend_data: None,
            technology: None,
            time: Utc::now(),
            outbound: false,
        }
    }

    pub fn outbound(mut self) -> Self {
        self.outbound = true;
        self
    }

    pub fn contact_or_line(&self) -> Contact {
        self.contact
            .clone()
            .unwrap_or_else(|| Contact::new(self.backend, self.line_identifier.clone()))
    }
}

/// A user-visible notification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// The single global decision derived from all live calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallMode {
    #[default]
    NoCall,
    Ringing,
    InCall,
    /// In a call whose audio does not use the device voice path
    InCallNoRoute,
}

impl CallMode {
    pub fn is_in_call(self) -> bool {
        matches!(self, CallMode::InCall | CallMode::InCallNoRoute)
    }
}

/// Audio output route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioRoute {
    /// No route was ever delivered
    #[default]
    Unknown,
    Speaker,
    Handset,
    Headset,
    Bluetooth,
}

/// Vibration request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VibrateKind {
    Stop,
    Call,
    Message,
}
