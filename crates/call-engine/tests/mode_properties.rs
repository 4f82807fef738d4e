//! Random call event sequences against a simple model of the live set.

use commbus_call_engine::CallModeManager;
use commbus_comm_core::{BackendId, Call, CallKey, CallMode, CallState, CommContext};
use proptest::prelude::*;
use std::collections::HashMap;

fn state() -> impl Strategy<Value = CallState> {
    prop_oneof![
        Just(CallState::Dialing),
        Just(CallState::Alerting),
        Just(CallState::Incoming),
        Just(CallState::Waiting),
        Just(CallState::Active),
        Just(CallState::Held),
        Just(CallState::Disconnected),
    ]
}

#[derive(Debug, Clone)]
enum Event {
    New { backend: u32, line: u8, state: CallState, needs_route: bool },
    Changed { backend: u32, line: u8, state: CallState },
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0..2u32, 0..3u8, state(), any::<bool>()).prop_map(|(backend, line, state, needs_route)| {
            Event::New { backend, line, state, needs_route }
        }),
        (0..2u32, 0..3u8, state())
            .prop_map(|(backend, line, state)| Event::Changed { backend, line, state }),
    ]
}

fn expected_mode(live: &HashMap<CallKey, (CallState, bool)>) -> CallMode {
    let routed = |s: CallState| matches!(s, CallState::Active | CallState::Dialing | CallState::Alerting);
    if live.values().any(|(s, r)| routed(*s) && *r) {
        CallMode::InCall
    } else if live.values().any(|(s, _)| routed(*s)) {
        CallMode::InCallNoRoute
    } else if live.values().any(|(s, _)| *s == CallState::Incoming) {
        CallMode::Ringing
    } else {
        CallMode::NoCall
    }
}

proptest! {
    #[test]
    fn mode_follows_live_calls(events in prop::collection::vec(event(), 1..40)) {
        let ctx = CommContext::shared();
        let manager = CallModeManager::new(ctx.clone());
        let mut model: HashMap<CallKey, (CallState, bool)> = HashMap::new();

        for event in events {
            match event {
                Event::New { backend, line, state, needs_route } => {
                    let call = Call::new(BackendId(backend), line.to_string(), state)
                        .with_needs_route(needs_route);
                    if state == CallState::Disconnected {
                        model.remove(&call.key());
                    } else {
                        model.insert(call.key(), (state, needs_route));
                    }
                    manager.on_call_new(&call);
                }
                Event::Changed { backend, line, state } => {
                    let call = Call::new(BackendId(backend), line.to_string(), state);
                    let key = call.key();
                    if state == CallState::Disconnected {
                        model.remove(&key);
                    } else if let Some(entry) = model.get_mut(&key) {
                        entry.0 = state;
                    }
                    manager.on_call_changed(&call);
                }
            }

            let expected = expected_mode(&model);
            prop_assert_eq!(manager.mode(), expected);
            prop_assert_eq!(ctx.pipes.current_mode(), expected);
            prop_assert_eq!(manager.live_calls().len(), model.len());
        }
    }
}
