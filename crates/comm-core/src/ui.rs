//! # UI Registry
//!
//! Front-end modules register a [`UiBundle`] holding the user-facing actions
//! they implement. Callers never talk to a front-end directly; they go through
//! [`UiRegistry`], which picks a provider:
//!
//! - show-style actions go to the first bundle, in registration order, that
//!   provides the action; when none does an error is published on the error
//!   pipe and the action reports `false`
//! - [`UiRegistry::thread_shown`] asks every provider and is `true` when any
//!   of them shows the thread

use crate::pipes::Datapipes;
use crate::types::{Call, Contact, Message};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub type CallViewFn = Arc<dyn Fn(Option<&Call>) -> bool + Send + Sync>;
pub type MessageViewFn = Arc<dyn Fn(Option<&Message>) -> bool + Send + Sync>;
pub type ActionFn = Arc<dyn Fn() -> bool + Send + Sync>;
pub type ContactActionFn = Arc<dyn Fn(&Contact) -> bool + Send + Sync>;
pub type ActiveCallFn = Arc<dyn Fn(&Call) -> bool + Send + Sync>;

/// Set of front-end capabilities provided by one module
#[derive(Clone, Default)]
pub struct UiBundle {
    name: String,
    dialer_show: Option<CallViewFn>,
    sms_compose_show: Option<MessageViewFn>,
    options_open: Option<ActionFn>,
    history_open: Option<ActionFn>,
    contact_chooser_show: Option<ActionFn>,
    contact_chooser_close: Option<ActionFn>,
    thread_view_show: Option<ContactActionFn>,
    thread_shown: Option<ContactActionFn>,
    dtmf_show: Option<ActiveCallFn>,
}

impl UiBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_dialer_show(mut self, f: impl Fn(Option<&Call>) -> bool + Send + Sync + 'static) -> Self {
        self.dialer_show = Some(Arc::new(f));
        self
    }

    pub fn with_sms_compose_show(
        mut self,
        f: impl Fn(Option<&Message>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.sms_compose_show = Some(Arc::new(f));
        self
    }

    pub fn with_options_open(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.options_open = Some(Arc::new(f));
        self
    }

    pub fn with_history_open(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.history_open = Some(Arc::new(f));
        self
    }

    pub fn with_contact_chooser_show(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.contact_chooser_show = Some(Arc::new(f));
        self
    }

    pub fn with_contact_chooser_close(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.contact_chooser_close = Some(Arc::new(f));
        self
    }

    pub fn with_thread_view_show(mut self, f: impl Fn(&Contact) -> bool + Send + Sync + 'static) -> Self {
        self.thread_view_show = Some(Arc::new(f));
        self
    }

    pub fn with_thread_shown(mut self, f: impl Fn(&Contact) -> bool + Send + Sync + 'static) -> Self {
        self.thread_shown = Some(Arc::new(f));
        self
    }

    pub fn with_dtmf_show(mut self, f: impl Fn(&Call) -> bool + Send + Sync + 'static) -> Self {
        self.dtmf_show = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for UiBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiBundle")
            .field("name", &self.name)
            .field("dialer_show", &self.dialer_show.is_some())
            .field("sms_compose_show", &self.sms_compose_show.is_some())
            .field("options_open", &self.options_open.is_some())
            .field("history_open", &self.history_open.is_some())
            .field("contact_chooser_show", &self.contact_chooser_show.is_some())
            .field("contact_chooser_close", &self.contact_chooser_close.is_some())
            .field("thread_view_show", &self.thread_view_show.is_some())
            .field("thread_shown", &self.thread_shown.is_some())
            .field("dtmf_show", &self.dtmf_show.is_some())
            .finish()
    }
}

/// Handle of a registered bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiId(u64);

/// Ordered list of registered front-end bundles
pub struct UiRegistry {
    pipes: Arc<Datapipes>,
    bundles: RwLock<Vec<(UiId, Arc<UiBundle>)>>,
    next_id: AtomicU64,
}

impl UiRegistry {
    pub fn new(pipes: Arc<Datapipes>) -> Self {
        Self {
            pipes,
            bundles: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn register(&self, bundle: UiBundle) -> UiId {
        let id = UiId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("UI bundle {} registered", bundle.name);
        self.bundles.write().push((id, Arc::new(bundle)));
        id
    }

    pub fn remove(&self, id: UiId) -> bool {
        let mut bundles = self.bundles.write();
        match bundles.iter().position(|(bid, _)| *bid == id) {
            Some(index) => {
                let (_, bundle) = bundles.remove(index);
                debug!("UI bundle {} removed", bundle.name);
                true
            }
            None => {
                warn!("Trying to remove non-existing UI bundle {:?}", id);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    fn snapshot(&self) -> Vec<Arc<UiBundle>> {
        self.bundles.read().iter().map(|(_, b)| b.clone()).collect()
    }

    /// First provider of a capability; the lock is released before it is invoked
    fn first<F: Clone>(&self, capability: impl Fn(&UiBundle) -> Option<&F>) -> Option<F> {
        self.snapshot().iter().find_map(|b| capability(b).cloned())
    }

    fn not_handled(&self, operation: &str) -> bool {
        warn!("No frontend available for {}", operation);
        self.pipes
            .report_error(format!("No frontend available for {}", operation));
        false
    }

    pub fn dialer_show(&self, call: Option<&Call>) -> bool {
        match self.first(|b| b.dialer_show.as_ref()) {
            Some(show) => show(call),
            None => self.not_handled("dialer_show"),
        }
    }

    pub fn sms_compose_show(&self, message: Option<&Message>) -> bool {
        match self.first(|b| b.sms_compose_show.as_ref()) {
            Some(show) => show(message),
            None => self.not_handled("sms_compose_show"),
        }
    }

    pub fn options_open(&self) -> bool {
        match self.first(|b| b.options_open.as_ref()) {
            Some(open) => open(),
            None => self.not_handled("options_open"),
        }
    }

    pub fn history_open(&self) -> bool {
        match self.first(|b| b.history_open.as_ref()) {
            Some(open) => open(),
            None => self.not_handled("history_open"),
        }
    }

    pub fn contact_chooser_show(&self) -> bool {
        match self.first(|b| b.contact_chooser_show.as_ref()) {
            Some(show) => show(),
            None => self.not_handled("contact_chooser_show"),
        }
    }

    pub fn contact_chooser_close(&self) -> bool {
        match self.first(|b| b.contact_chooser_close.as_ref()) {
            Some(close) => close(),
            None => self.not_handled("contact_chooser_close"),
        }
    }

    pub fn thread_view_show(&self, contact: &Contact) -> bool {
        match self.first(|b| b.thread_view_show.as_ref()) {
            Some(show) => show(contact),
            None => self.not_handled("thread_view_show"),
        }
    }

    pub fn dtmf_show(&self, call: &Call) -> bool {
        match self.first(|b| b.dtmf_show.as_ref()) {
            Some(show) => show(call),
            None => self.not_handled("dtmf_show"),
        }
    }

    /// Whether any front-end currently shows the message thread of `contact`
    pub fn thread_shown(&self, contact: &Contact) -> bool {
        let providers: Vec<ContactActionFn> = self
            .snapshot()
            .iter()
            .filter_map(|b| b.thread_shown.clone())
            .collect();
        if providers.is_empty() {
            debug!("No frontend provides thread_shown");
            return false;
        }
        providers.iter().any(|shown| shown(contact))
    }
}
