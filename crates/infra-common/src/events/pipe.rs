use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(u64);

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe#{}", self.0)
    }
}

/// Outcome of a single filter step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filtered<T> {
    /// Hand the (possibly rewritten) payload to the next step
    Pass(T),
    /// Veto the payload; no later filter and no trigger will see it
    Drop,
}

/// Which list of a pipe a registration lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    Filter,
    Trigger,
}

/// Handle returned when attaching a filter or trigger.
///
/// Every attach yields a distinct handle, so attaching the same callback twice
/// makes it run twice per publish and needs two removals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
    pipe: PipeId,
    slot: u64,
    kind: RegistrationKind,
}

impl Registration {
    pub fn pipe(&self) -> PipeId {
        self.pipe
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }
}

type FilterFn<T> = Arc<dyn Fn(T) -> Filtered<T> + Send + Sync>;
type TriggerFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slot<F> {
    owner: String,
    callback: F,
}

struct Chains<T> {
    filters: BTreeMap<u64, Slot<FilterFn<T>>>,
    triggers: BTreeMap<u64, Slot<TriggerFn<T>>>,
    next_slot: u64,
}

impl<T> Chains<T> {
    fn allocate(&mut self) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }
}

/// A named, typed event channel.
///
/// Filters and triggers run on the publisher's thread in registration order.
/// Both lists are snapshotted when a publish starts and no lock is held while
/// callbacks run, so a callback may publish (to this or any pipe) or attach
/// and detach registrations; such changes apply from the next publish on.
///
/// "No payload" is expressed through the payload type itself, e.g.
/// `Pipe<Option<Contact>>`; a filter turning `None` into `None` passes, only
/// [`Filtered::Drop`] drops.
pub struct Pipe<T> {
    id: PipeId,
    name: String,
    chains: RwLock<Chains<T>>,
    last: Mutex<Option<T>>,
}

impl<T> fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains = self.chains.read();
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("filters", &chains.filters.len())
            .field("triggers", &chains.triggers.len())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Pipe<T> {
    /// Create an empty pipe with no cached payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PipeId(NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            chains: RwLock::new(Chains {
                filters: BTreeMap::new(),
                triggers: BTreeMap::new(),
                next_slot: 0,
            }),
            last: Mutex::new(None),
        }
    }

    pub fn id(&self) -> PipeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a filter to the chain
    pub fn add_filter<F>(&self, owner: impl Into<String>, filter: F) -> Registration
    where
        F: Fn(T) -> Filtered<T> + Send + Sync + 'static,
    {
        let mut chains = self.chains.write();
        let slot = chains.allocate();
        chains.filters.insert(
            slot,
            Slot {
                owner: owner.into(),
                callback: Arc::new(filter),
            },
        );
        Registration {
            pipe: self.id,
            slot,
            kind: RegistrationKind::Filter,
        }
    }

    /// Append an output trigger
    pub fn add_trigger<F>(&self, owner: impl Into<String>, trigger: F) -> Registration
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut chains = self.chains.write();
        let slot = chains.allocate();
        chains.triggers.insert(
            slot,
            Slot {
                owner: owner.into(),
                callback: Arc::new(trigger),
            },
        );
        Registration {
            pipe: self.id,
            slot,
            kind: RegistrationKind::Trigger,
        }
    }

    /// Detach a filter. Unknown registrations are logged and ignored.
    pub fn remove_filter(&self, registration: &Registration) -> bool {
        if !self.owns(registration, RegistrationKind::Filter) {
            return false;
        }
        let removed = self.chains.write().filters.remove(&registration.slot).is_some();
        if !removed {
            warn!("Trying to remove non-existing filter from pipe {}", self.name);
        }
        removed
    }

    /// Detach a trigger. Unknown registrations are logged and ignored.
    pub fn remove_trigger(&self, registration: &Registration) -> bool {
        if !self.owns(registration, RegistrationKind::Trigger) {
            return false;
        }
        let removed = self.chains.write().triggers.remove(&registration.slot).is_some();
        if !removed {
            warn!("Trying to remove non-existing trigger from pipe {}", self.name);
        }
        removed
    }

    /// Detach either kind of registration
    pub fn remove(&self, registration: &Registration) -> bool {
        match registration.kind {
            RegistrationKind::Filter => self.remove_filter(registration),
            RegistrationKind::Trigger => self.remove_trigger(registration),
        }
    }

    fn owns(&self, registration: &Registration, kind: RegistrationKind) -> bool {
        if registration.pipe != self.id {
            warn!(
                "Registration for {} used on pipe {} ({})",
                registration.pipe, self.name, self.id
            );
            return false;
        }
        if registration.kind != kind {
            warn!(
                "{:?} registration used as a {:?} on pipe {}",
                registration.kind, kind, self.name
            );
            return false;
        }
        true
    }

    /// Run the filter chain only. `None` means a filter dropped the payload.
    pub fn run_filters(&self, payload: T) -> Option<T> {
        let filters: Vec<FilterFn<T>> = self
            .chains
            .read()
            .filters
            .values()
            .map(|slot| slot.callback.clone())
            .collect();

        let mut data = payload;
        for filter in filters {
            match filter(data) {
                Filtered::Pass(next) => data = next,
                Filtered::Drop => {
                    debug!("Payload dropped by a filter on pipe {}", self.name);
                    return None;
                }
            }
        }
        Some(data)
    }

    /// Filter the payload, then deliver it to every trigger.
    ///
    /// Returns the delivered payload, or `None` when it was dropped. The
    /// delivered payload becomes [`Pipe::last_delivered`] before the first
    /// trigger runs, so triggers and nested publishers observe it.
    pub fn publish(&self, payload: T) -> Option<T> {
        let data = self.run_filters(payload)?;

        let triggers: Vec<TriggerFn<T>> = self
            .chains
            .read()
            .triggers
            .values()
            .map(|slot| slot.callback.clone())
            .collect();

        *self.last.lock() = Some(data.clone());

        for trigger in triggers {
            trigger(&data);
        }
        Some(data)
    }

    /// The most recent payload that was not dropped
    pub fn last_delivered(&self) -> Option<T> {
        self.last.lock().clone()
    }

    pub fn filter_count(&self) -> usize {
        self.chains.read().filters.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.chains.read().triggers.len()
    }

    /// Detach everything, reporting registrants that never detached themselves.
    ///
    /// Returns the number of leftover registrations.
    pub fn teardown(&self) -> usize {
        let mut chains = self.chains.write();
        for slot in chains.filters.values() {
            warn!("Pipe {} still has a filter registered by {}", self.name, slot.owner);
        }
        for slot in chains.triggers.values() {
            warn!("Pipe {} still has a trigger registered by {}", self.name, slot.owner);
        }
        let leftovers = chains.filters.len() + chains.triggers.len();
        chains.filters.clear();
        chains.triggers.clear();
        *self.last.lock() = None;
        leftovers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_filters_run_in_order_and_feed_each_other() {
        let pipe: Pipe<Vec<u8>> = Pipe::new("order");
        pipe.add_filter("a", |mut v: Vec<u8>| {
            v.push(1);
            Filtered::Pass(v)
        });
        pipe.add_filter("b", |mut v: Vec<u8>| {
            v.push(2);
            Filtered::Pass(v)
        });
        assert_eq!(pipe.run_filters(Vec::new()), Some(vec![1, 2]));
    }

    #[test]
    fn test_drop_skips_later_filters_and_triggers() {
        let pipe: Pipe<u32> = Pipe::new("drop");
        let later = Arc::new(AtomicUsize::new(0));
        let triggered = Arc::new(AtomicUsize::new(0));

        pipe.add_filter("veto", |_| Filtered::Drop);
        let l = later.clone();
        pipe.add_filter("later", move |v| {
            l.fetch_add(1, Ordering::SeqCst);
            Filtered::Pass(v)
        });
        let t = triggered.clone();
        pipe.add_trigger("observer", move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(pipe.publish(7), None);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(triggered.load(Ordering::SeqCst), 0);
        assert_eq!(pipe.last_delivered(), None);
    }

    #[test]
    fn test_absent_payload_is_not_a_drop() {
        let pipe: Pipe<Option<String>> = Pipe::new("optional");
        pipe.add_filter("identity", Filtered::Pass);
        assert_eq!(pipe.publish(None), Some(None));
        assert_eq!(pipe.last_delivered(), Some(None));
    }

    #[test]
    fn test_last_delivered_tracks_published_values() {
        let pipe: Pipe<u32> = Pipe::new("cache");
        assert_eq!(pipe.last_delivered(), None);
        pipe.publish(3);
        pipe.publish(4);
        assert_eq!(pipe.last_delivered(), Some(4));
    }

    #[test]
    fn test_double_removal_is_noop() {
        let pipe: Pipe<u32> = Pipe::new("remove");
        let reg = pipe.add_trigger("t", |_| {});
        let keep = pipe.add_trigger("t2", |_| {});
        assert!(pipe.remove_trigger(&reg));
        assert!(!pipe.remove_trigger(&reg));
        assert_eq!(pipe.trigger_count(), 1);
        assert!(pipe.remove(&keep));
        assert_eq!(pipe.trigger_count(), 0);
    }

    #[test]
    fn test_foreign_and_mismatched_registrations_are_rejected() {
        let a: Pipe<u32> = Pipe::new("a");
        let b: Pipe<u32> = Pipe::new("b");
        let reg = a.add_trigger("t", |_| {});
        assert!(!b.remove_trigger(&reg));
        assert!(!a.remove_filter(&reg));
        assert_eq!(a.trigger_count(), 1);
    }

    #[test]
    fn test_teardown_counts_leftovers() {
        let pipe: Pipe<u32> = Pipe::new("teardown");
        pipe.add_filter("f", Filtered::Pass);
        pipe.add_trigger("t", |_| {});
        pipe.publish(1);
        assert_eq!(pipe.teardown(), 2);
        assert_eq!(pipe.teardown(), 0);
        assert_eq!(pipe.last_delivered(), None);
    }
}
