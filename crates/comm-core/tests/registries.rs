//! Backend and UI registry behavior observed through the pipes.

use commbus_comm_core::{
    BackendFlags, BackendId, Call, CallState, CommContext, Contact, Message, UiBundle,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn backend_ids_are_never_reused(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let ctx = CommContext::new();
        let mut live: Vec<BackendId> = Vec::new();
        let mut seen: Vec<BackendId> = Vec::new();

        for add in ops {
            if add || live.is_empty() {
                let id = ctx.backends.add("b", vec![], BackendFlags::CALL, None);
                prop_assert!(!seen.contains(&id));
                prop_assert!(seen.last().map_or(true, |last| *last < id));
                seen.push(id);
                live.push(id);
            } else {
                let id = live.remove(0);
                prop_assert!(ctx.backends.remove(id));
            }
        }
        prop_assert_eq!(ctx.backends.len(), live.len());
    }
}

#[test]
fn test_backend_events_carry_the_backend() {
    let ctx = CommContext::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    let e = events.clone();
    let added = ctx
        .pipes
        .comm_backend_added
        .add_trigger("test", move |b| e.lock().push(format!("+{}", b.name)));
    let e = events.clone();
    let removed = ctx
        .pipes
        .comm_backend_removed
        .add_trigger("test", move |b| e.lock().push(format!("-{}", b.name)));

    let modem = ctx.backends.add("modem", vec![], BackendFlags::CALL, None);
    ctx.backends.add("sip", vec![], BackendFlags::CALL, None);
    ctx.backends.remove(modem);
    ctx.backends.remove(modem);

    assert_eq!(*events.lock(), vec!["+modem", "+sip", "-modem"]);

    ctx.pipes.comm_backend_added.remove(&added);
    ctx.pipes.comm_backend_removed.remove(&removed);
    assert_eq!(ctx.teardown(), 0);
}

#[test]
fn test_registry_lookup_from_inside_added_trigger() {
    let ctx = CommContext::shared();
    let seen = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&ctx);
    let s = seen.clone();
    ctx.pipes.comm_backend_added.add_trigger("test", move |b| {
        if let Some(ctx) = weak.upgrade() {
            *s.lock() = ctx.backends.default_backend().map(|d| d.id == b.id);
        }
    });

    ctx.backends.add("modem", vec![], BackendFlags::CALL, None);
    assert_eq!(*seen.lock(), Some(true));
}

#[test]
fn test_ui_dispatch_skips_bundles_without_capability() {
    let ctx = CommContext::new();
    let shown = Arc::new(Mutex::new(Vec::new()));

    ctx.ui.register(UiBundle::new("notifier").with_thread_shown(|_| false));
    let s = shown.clone();
    ctx.ui.register(
        UiBundle::new("gui")
            .with_thread_view_show(move |c| {
                s.lock().push(c.display_name().to_string());
                true
            })
            .with_sms_compose_show(|m| m.is_some_and(|m| !m.text.is_empty())),
    );

    assert!(ctx.ui.thread_view_show(&Contact::new(BackendId(0), "555").with_name("Dana")));
    assert_eq!(*shown.lock(), vec!["Dana"]);

    assert!(ctx.ui.sms_compose_show(Some(&Message::new(BackendId(0), "555", "hi"))));
    assert!(!ctx.ui.sms_compose_show(None));
    assert!(ctx.pipes.call_backend_error.last_delivered().is_none());

    assert!(!ctx.ui.history_open());
    assert_eq!(
        ctx.pipes.call_backend_error.last_delivered().as_deref(),
        Some("No frontend available for history_open")
    );
}

#[test]
fn test_ui_dtmf_and_chooser_reach_provider() {
    let ctx = CommContext::new();
    let calls = Arc::new(Mutex::new(0));
    let c = calls.clone();
    let id = ctx.ui.register(
        UiBundle::new("gui")
            .with_dtmf_show(move |call| {
                *c.lock() += 1;
                call.state == CallState::Active
            })
            .with_contact_chooser_show(|| true)
            .with_contact_chooser_close(|| true),
    );

    assert!(ctx.ui.dtmf_show(&Call::new(BackendId(0), "1", CallState::Active)));
    assert!(!ctx.ui.dtmf_show(&Call::new(BackendId(0), "1", CallState::Held)));
    assert_eq!(*calls.lock(), 2);
    assert!(ctx.ui.contact_chooser_show());
    assert!(ctx.ui.contact_chooser_close());

    ctx.ui.remove(id);
    assert!(!ctx.ui.contact_chooser_show());
}
