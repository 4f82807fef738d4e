use commbus_infra_common::{Filtered, Pipe, Registration};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn triggers_run_in_registration_order() {
    let pipe: Pipe<u32> = Pipe::new("ordering");
    let seen = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let seen = seen.clone();
        pipe.add_trigger(tag, move |v: &u32| seen.lock().push((tag, *v)));
    }
    pipe.publish(5);
    assert_eq!(
        *seen.lock(),
        vec![("first", 5), ("second", 5), ("third", 5)]
    );
}

#[test]
fn removing_a_trigger_mid_publish_does_not_affect_the_current_delivery() {
    let pipe: Arc<Pipe<u32>> = Arc::new(Pipe::new("snapshot"));
    let victim_runs = Arc::new(AtomicUsize::new(0));
    let victim_reg: Arc<Mutex<Option<Registration>>> = Arc::new(Mutex::new(None));

    let remover_pipe = Arc::downgrade(&pipe);
    let to_remove = victim_reg.clone();
    pipe.add_trigger("remover", move |_| {
        if let (Some(pipe), Some(reg)) = (remover_pipe.upgrade(), to_remove.lock().take()) {
            assert!(pipe.remove_trigger(&reg));
        }
    });

    let runs = victim_runs.clone();
    let reg = pipe.add_trigger("victim", move |_| {
        runs.fetch_add(1, Ordering::SeqCst);
    });
    *victim_reg.lock() = Some(reg);

    pipe.publish(1);
    assert_eq!(victim_runs.load(Ordering::SeqCst), 1, "snapshot still includes the victim");
    assert_eq!(pipe.trigger_count(), 1);

    pipe.publish(2);
    assert_eq!(victim_runs.load(Ordering::SeqCst), 1, "victim gone from the next publish");
}

#[test]
fn trigger_added_mid_publish_starts_with_the_next_publish() {
    let pipe: Arc<Pipe<u32>> = Arc::new(Pipe::new("late-join"));
    let late_runs = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&pipe);
    let runs = late_runs.clone();
    let added = Arc::new(AtomicUsize::new(0));
    pipe.add_trigger("joiner", move |_| {
        if added.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(pipe) = weak.upgrade() {
                let runs = runs.clone();
                pipe.add_trigger("late", move |_| {
                    runs.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
    });

    pipe.publish(1);
    assert_eq!(late_runs.load(Ordering::SeqCst), 0);
    pipe.publish(2);
    assert_eq!(late_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_registration_delivers_twice_and_removes_once() {
    let pipe: Pipe<u32> = Pipe::new("duplicates");
    let count = Arc::new(AtomicUsize::new(0));
    let make = |count: Arc<AtomicUsize>| {
        move |v: u32| {
            count.fetch_add(1, Ordering::SeqCst);
            Filtered::Pass(v)
        }
    };

    let first = pipe.add_filter("dup", make(count.clone()));
    let _second = pipe.add_filter("dup", make(count.clone()));
    assert_ne!(first, _second);

    pipe.publish(0);
    assert_eq!(count.load(Ordering::SeqCst), 2);

    assert!(pipe.remove_filter(&first));
    assert_eq!(pipe.filter_count(), 1);
    pipe.publish(0);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn nested_publishes_complete_before_the_outer_one_returns() {
    let outer: Arc<Pipe<u32>> = Arc::new(Pipe::new("outer"));
    let inner: Arc<Pipe<u32>> = Arc::new(Pipe::new("inner"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    inner.add_trigger("inner-observer", move |v| l.lock().push(format!("inner {}", v)));

    let l = log.clone();
    let target = inner.clone();
    outer.add_trigger("forwarder", move |v| {
        l.lock().push(format!("outer {}", v));
        target.publish(v * 10);
        l.lock().push("outer done".to_string());
    });

    outer.publish(4);
    assert_eq!(
        *log.lock(),
        vec!["outer 4".to_string(), "inner 40".to_string(), "outer done".to_string()]
    );
    assert_eq!(inner.last_delivered(), Some(40));
}

#[test]
fn trigger_sees_its_own_payload_as_last_delivered() {
    let pipe: Arc<Pipe<u32>> = Arc::new(Pipe::new("self-query"));
    let observed = Arc::new(Mutex::new(None));
    let weak = Arc::downgrade(&pipe);
    let o = observed.clone();
    pipe.add_trigger("reader", move |_| {
        *o.lock() = weak.upgrade().and_then(|p| p.last_delivered());
    });
    pipe.publish(9);
    assert_eq!(*observed.lock(), Some(9));
}

proptest! {
    #[test]
    fn drop_short_circuits_every_later_step(len in 1usize..12, drop_at in 0usize..12) {
        let drop_at = drop_at % len;
        let pipe: Pipe<u64> = Pipe::new("prop");
        let ran = Arc::new(Mutex::new(Vec::new()));

        for i in 0..len {
            let ran = ran.clone();
            pipe.add_filter(format!("f{}", i), move |v: u64| {
                ran.lock().push(i);
                if i == drop_at { Filtered::Drop } else { Filtered::Pass(v + 1) }
            });
        }
        let triggered = Arc::new(AtomicUsize::new(0));
        let t = triggered.clone();
        pipe.add_trigger("t", move |_| { t.fetch_add(1, Ordering::SeqCst); });

        prop_assert_eq!(pipe.publish(0), None);
        prop_assert_eq!(ran.lock().clone(), (0..=drop_at).collect::<Vec<_>>());
        prop_assert_eq!(triggered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn passing_chain_delivers_the_fully_filtered_value(len in 0usize..12, start in 0u64..1000) {
        let pipe: Pipe<u64> = Pipe::new("prop-pass");
        for i in 0..len {
            pipe.add_filter(format!("f{}", i), |v: u64| Filtered::Pass(v + 1));
        }
        let delivered = Arc::new(Mutex::new(None));
        let d = delivered.clone();
        pipe.add_trigger("t", move |v| { *d.lock() = Some(*v); });

        let expected = start + len as u64;
        prop_assert_eq!(pipe.publish(start), Some(expected));
        prop_assert_eq!(*delivered.lock(), Some(expected));
        prop_assert_eq!(pipe.last_delivered(), Some(expected));
    }
}
