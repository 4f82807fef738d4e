//! # Backend Registry
//!
//! Tracks the communication backends (modem, VoIP accounts, test stubs) that
//! are currently registered. A backend driver module adds its backend during
//! init and removes it during exit; every change is announced on the
//! `comm_backend_added` / `comm_backend_removed` pipes.
//!
//! Ids come from a monotonic counter and are never handed out twice by the
//! same registry. A [`Call`](crate::types::Call) may outlive its backend;
//! consumers resolve such dangling ids through [`BackendRegistry::backend_name`]
//! which reports them as `"unknown"`.

use crate::pipes::Datapipes;
use crate::types::BackendId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Capability bits of a backend or of one of its URI schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BackendFlags(u32);

impl BackendFlags {
    pub const CALL: BackendFlags = BackendFlags(1 << 0);
    pub const MESSAGE: BackendFlags = BackendFlags(1 << 1);
    pub const CELLULAR: BackendFlags = BackendFlags(1 << 2);

    pub const fn empty() -> Self {
        BackendFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`
    pub const fn contains(self, other: BackendFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BackendFlags {
    type Output = BackendFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        BackendFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for BackendFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A URI scheme a backend handles, e.g. `tel` or `sip`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    pub scheme: String,
    pub flags: BackendFlags,
}

impl Scheme {
    pub fn new(scheme: impl Into<String>, flags: BackendFlags) -> Self {
        Self {
            scheme: scheme.into(),
            flags,
        }
    }
}

/// Predicate deciding whether a recipient identifier is valid for a backend
pub type IdentifierValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A registered communication backend
#[derive(Clone)]
pub struct Backend {
    pub id: BackendId,
    pub name: String,
    pub flags: BackendFlags,
    pub schemes: Vec<Scheme>,
    pub valid_identifier: Option<IdentifierValidator>,
}

impl Backend {
    /// Check a recipient identifier; backends without a validator accept anything
    pub fn is_valid_identifier(&self, identifier: &str) -> bool {
        self.valid_identifier
            .as_ref()
            .map_or(true, |validate| validate(identifier))
    }

    pub fn handles_scheme(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s.scheme == scheme)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("schemes", &self.schemes)
            .field("valid_identifier", &self.valid_identifier.is_some())
            .finish()
    }
}

#[derive(Default)]
struct BackendTable {
    /// Registration order
    backends: Vec<Backend>,
    default: Option<BackendId>,
    next_id: u32,
}

/// Registry of active backends
pub struct BackendRegistry {
    pipes: Arc<Datapipes>,
    table: RwLock<BackendTable>,
}

impl BackendRegistry {
    pub fn new(pipes: Arc<Datapipes>) -> Self {
        Self {
            pipes,
            table: RwLock::new(BackendTable::default()),
        }
    }

    /// Register a backend and make it the default
    pub fn add(
        &self,
        name: impl Into<String>,
        schemes: Vec<Scheme>,
        flags: BackendFlags,
        valid_identifier: Option<IdentifierValidator>,
    ) -> BackendId {
        let backend = {
            let mut table = self.table.write();
            let id = BackendId(table.next_id);
            table.next_id += 1;
            let backend = Backend {
                id,
                name: name.into(),
                flags,
                schemes,
                valid_identifier,
            };
            table.backends.push(backend.clone());
            table.default = Some(id);
            backend
        };

        info!("Comm backend added: {} (id {})", backend.name, backend.id);
        let id = backend.id;
        self.pipes.comm_backend_added.publish(backend);
        id
    }

    /// Unregister a backend. If it was the default, no backend is default afterwards.
    pub fn remove(&self, id: BackendId) -> bool {
        let removed = {
            let mut table = self.table.write();
            match table.backends.iter().position(|b| b.id == id) {
                Some(index) => {
                    if table.default == Some(id) {
                        table.default = None;
                    }
                    Some(table.backends.remove(index))
                }
                None => None,
            }
        };

        match removed {
            Some(backend) => {
                info!("Comm backend removed: {} (id {})", backend.name, backend.id);
                self.pipes.comm_backend_removed.publish(backend);
                true
            }
            None => {
                warn!("Trying to remove non-existing comm backend with id {}", id);
                false
            }
        }
    }

    pub fn get(&self, id: BackendId) -> Option<Backend> {
        self.table.read().backends.iter().find(|b| b.id == id).cloned()
    }

    pub fn default_backend(&self) -> Option<Backend> {
        let table = self.table.read();
        let id = table.default?;
        table.backends.iter().find(|b| b.id == id).cloned()
    }

    /// Make an already registered backend the default
    pub fn set_default(&self, id: BackendId) -> bool {
        let mut table = self.table.write();
        if table.backends.iter().any(|b| b.id == id) {
            table.default = Some(id);
            true
        } else {
            debug!("Cannot make unknown backend {} the default", id);
            false
        }
    }

    pub fn find_id_by_name(&self, name: &str) -> Option<BackendId> {
        self.table
            .read()
            .backends
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.id)
    }

    /// First backend, in registration order, declaring `scheme` and carrying `required` flags
    pub fn find_for_scheme(&self, scheme: &str, required: BackendFlags) -> Option<Backend> {
        self.table
            .read()
            .backends
            .iter()
            .find(|b| b.handles_scheme(scheme) && b.flags.contains(required))
            .cloned()
    }

    /// All backends in registration order
    pub fn all(&self) -> Vec<Backend> {
        self.table.read().backends.clone()
    }

    /// Human-readable name, `"unknown"` for ids that are not (or no longer) registered
    pub fn backend_name(&self, id: BackendId) -> String {
        self.table
            .read()
            .backends
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn len(&self) -> usize {
        self.table.read().backends.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BackendRegistry {
        BackendRegistry::new(Arc::new(Datapipes::new()))
    }

    #[test]
    fn test_flags() {
        let both = BackendFlags::CALL | BackendFlags::MESSAGE;
        assert!(both.contains(BackendFlags::CALL));
        assert!(both.contains(BackendFlags::empty()));
        assert!(!both.contains(BackendFlags::CELLULAR));
        let mut f = BackendFlags::empty();
        assert!(f.is_empty());
        f |= BackendFlags::CELLULAR;
        assert_eq!(f.bits(), 4);
    }

    #[test]
    fn test_latest_added_becomes_default() {
        let reg = registry();
        let modem = reg.add("modem", vec![], BackendFlags::CALL, None);
        assert_eq!(reg.default_backend().map(|b| b.id), Some(modem));
        let sip = reg.add("sip", vec![], BackendFlags::CALL, None);
        assert_eq!(reg.default_backend().map(|b| b.id), Some(sip));

        assert!(reg.set_default(modem));
        assert_eq!(reg.default_backend().map(|b| b.id), Some(modem));
        assert!(!reg.set_default(BackendId(99)));
    }

    #[test]
    fn test_removing_default_leaves_no_default() {
        let reg = registry();
        let a = reg.add("a", vec![], BackendFlags::CALL, None);
        let b = reg.add("b", vec![], BackendFlags::CALL, None);
        assert!(reg.remove(b));
        assert!(reg.default_backend().is_none());
        assert!(reg.get(a).is_some());
        assert!(!reg.remove(b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_scheme_lookup_respects_order_and_flags() {
        let reg = registry();
        let sms_only = reg.add(
            "sms-gw",
            vec![Scheme::new("tel", BackendFlags::MESSAGE)],
            BackendFlags::MESSAGE,
            None,
        );
        let modem = reg.add(
            "modem",
            vec![Scheme::new("tel", BackendFlags::CALL | BackendFlags::MESSAGE)],
            BackendFlags::CALL | BackendFlags::MESSAGE | BackendFlags::CELLULAR,
            None,
        );

        assert_eq!(reg.find_for_scheme("tel", BackendFlags::MESSAGE).map(|b| b.id), Some(sms_only));
        assert_eq!(reg.find_for_scheme("tel", BackendFlags::CALL).map(|b| b.id), Some(modem));
        assert!(reg.find_for_scheme("sip", BackendFlags::empty()).is_none());
    }

    #[test]
    fn test_identifier_validation_and_names() {
        let reg = registry();
        let id = reg.add(
            "digits",
            vec![],
            BackendFlags::CALL,
            Some(Arc::new(|s: &str| s.chars().all(|c| c.is_ascii_digit() || c == '+'))),
        );
        let backend = reg.get(id).unwrap();
        assert!(backend.is_valid_identifier("+4912345"));
        assert!(!backend.is_valid_identifier("alice@example.org"));

        assert_eq!(reg.find_id_by_name("digits"), Some(id));
        assert_eq!(reg.backend_name(id), "digits");
        reg.remove(id);
        assert_eq!(reg.backend_name(id), "unknown");
        assert_eq!(reg.find_id_by_name("digits"), None);
    }
}
