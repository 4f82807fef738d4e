//! # Loopback Backend
//!
//! A communication backend without a network. Dialed calls are "answered" by
//! a simulated remote party that walks them through Dialing, Alerting and
//! Active, one step per `step_delay_ms`. Sent messages come back as incoming
//! messages after `echo_delay_ms`. When an answered call is hung up the
//! remote party calls back after `call_back_delay_ms`, if set.
//!
//! All delayed work is posted through the [`BusHandle`] so it runs on the
//! bus loop like any other event.

use crate::bus_loop::BusHandle;
use chrono::Utc;
use commbus_comm_core::{
    BackendFlags, BackendId, Call, CallKey, CallState, CommContext, Datapipes, ExitStatus,
    Message, Module, ModuleInfo, Registration, Result, Scheme,
};
use commbus_infra_common::config::SelfValidating;
use commbus_infra_common::Error;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

pub const MODULE_NAME: &str = "loopback";
pub const SCHEME: &str = "test";

/// The `[loopback]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Delay between the simulated remote party's call state steps
    pub step_delay_ms: u64,
    /// Delay before a sent message is echoed back
    pub echo_delay_ms: u64,
    /// Delay before the remote party calls back after an answered call ended
    pub call_back_delay_ms: Option<u64>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 3000,
            echo_delay_ms: 2000,
            call_back_delay_ms: Some(10_000),
        }
    }
}

impl SelfValidating for LoopbackConfig {
    fn validate(&self) -> Result<()> {
        if self.step_delay_ms == 0 {
            return Err(Error::Validation("loopback.step_delay_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Identifiers must be non-empty and free of whitespace and control characters
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control())
}

/// Running state of the loopback backend
pub struct Loopback {
    id: BackendId,
    pipes: Arc<Datapipes>,
    bus: BusHandle,
    config: LoopbackConfig,
    calls: Mutex<HashMap<CallKey, Call>>,
}

impl Loopback {
    pub fn backend_id(&self) -> BackendId {
        self.id
    }

    /// Calls this backend currently owns
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().values().cloned().collect()
    }

    fn delay(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// A remote party calls `line`; returns the announced call
    pub fn simulate_incoming_call(&self, line: &str) -> Call {
        let mut call = Call::new(self.id, line, CallState::Incoming).with_needs_route(true);
        call.start_time = Some(Utc::now());
        self.calls.lock().insert(call.key(), call.clone());
        debug!("Simulated incoming call from {}", line);
        self.pipes.call_new.publish(call.clone());
        call
    }

    /// A remote party sends `text` from `line`
    pub fn simulate_incoming_message(&self, line: &str, text: &str) -> Message {
        let message = Message::new(self.id, line, text);
        debug!("Simulated message from {} with text \"{}\"", line, text);
        self.pipes.message_received.publish(message.clone());
        message
    }

    fn on_dial(self: &Arc<Self>, call: &Call) {
        if call.backend != self.id {
            return;
        }
        if !is_valid_identifier(&call.line_identifier) {
            self.pipes
                .report_error(format!("Invalid number {:?}", call.line_identifier));
            return;
        }
        let mut tracked = call.clone();
        tracked.state = CallState::Invalid;
        tracked.needs_route = true;
        tracked.outbound = true;
        let key = tracked.key();
        let busy = {
            let mut calls = self.calls.lock();
            let busy = calls.contains_key(&key);
            if !busy {
                calls.insert(key.clone(), tracked);
            }
            busy
        };
        if busy {
            self.pipes
                .report_error(format!("Line {:?} is already in use", call.line_identifier));
            return;
        }
        debug!("Dialing {}", key);
        self.schedule_remote_step(key);
    }

    fn schedule_remote_step(self: &Arc<Self>, key: CallKey) {
        let weak = Arc::downgrade(self);
        self.bus
            .post_after(Self::delay(self.config.step_delay_ms), move |_ctx| {
                if let Some(loopback) = weak.upgrade() {
                    loopback.remote_step(key);
                }
            });
    }

    /// Advance a dialed call by one state, as the remote side would
    fn remote_step(self: &Arc<Self>, key: CallKey) {
        let step = {
            let mut calls = self.calls.lock();
            let Some(call) = calls.get_mut(&key) else {
                debug!("Call {} ended before the remote side answered", key);
                return;
            };
            match call.state {
                CallState::Invalid => {
                    call.state = CallState::Dialing;
                    Some((call.clone(), true, true))
                }
                CallState::Dialing => {
                    call.state = CallState::Alerting;
                    Some((call.clone(), false, true))
                }
                CallState::Alerting => {
                    call.state = CallState::Active;
                    call.answered = true;
                    call.start_time = Some(Utc::now());
                    Some((call.clone(), false, false))
                }
                _ => None,
            }
        };

        let Some((call, is_new, more)) = step else {
            return;
        };
        debug!("Remote side set {} to {}", key, call.state);
        if is_new {
            self.pipes.call_new.publish(call);
        } else {
            self.pipes.call_properties_changed.publish(call);
        }
        if more {
            self.schedule_remote_step(key);
        }
    }

    fn on_accept(&self, call: &Call) {
        if call.backend != self.id || call.state != CallState::Incoming {
            return;
        }
        let accepted = {
            let mut calls = self.calls.lock();
            calls.get_mut(&call.key()).map(|tracked| {
                tracked.answered = true;
                tracked.state = CallState::Active;
                tracked.start_time = Some(Utc::now());
                tracked.clone()
            })
        };
        match accepted {
            Some(call) => {
                self.pipes.call_properties_changed.publish(call);
            }
            None => warn!("Unable to find call {}", call.key()),
        }
    }

    fn on_hangup(self: &Arc<Self>, call: &Call) {
        if call.backend != self.id {
            return;
        }
        let Some(mut ended) = self.calls.lock().remove(&call.key()) else {
            warn!("Unable to find call {}", call.key());
            return;
        };
        ended.state = CallState::Disconnected;
        ended.end_time = Some(Utc::now());
        let answered = ended.answered;
        let line = ended.line_identifier.clone();
        self.pipes.call_properties_changed.publish(ended);

        if let (true, Some(ms)) = (answered, self.config.call_back_delay_ms) {
            debug!("{} will call back in {}ms", line, ms);
            let weak = Arc::downgrade(self);
            self.bus.post_after(Self::delay(ms), move |_ctx| {
                if let Some(loopback) = weak.upgrade() {
                    loopback.simulate_incoming_call(&line);
                }
            });
        }
    }

    fn on_message_send(self: &Arc<Self>, message: &Message) {
        if message.backend != self.id {
            return;
        }
        debug!(
            "Sending message to {} with text \"{}\"",
            message.line_identifier, message.text
        );
        let mut echo = message.clone();
        let weak = Arc::downgrade(self);
        self.bus
            .post_after(Self::delay(self.config.echo_delay_ms), move |_ctx| {
                if let Some(loopback) = weak.upgrade() {
                    echo.time = Utc::now();
                    echo.outbound = false;
                    loopback.pipes.message_received.publish(echo);
                }
            });
    }
}

/// The `loopback` module
pub struct LoopbackModule {
    info: ModuleInfo,
    bus: BusHandle,
    config: LoopbackConfig,
    state: Option<Arc<Loopback>>,
    registrations: Vec<Registration>,
}

impl LoopbackModule {
    pub fn new(bus: BusHandle, config: LoopbackConfig) -> Self {
        Self {
            info: ModuleInfo::new(MODULE_NAME, &[MODULE_NAME], 250),
            bus,
            config,
            state: None,
            registrations: Vec::new(),
        }
    }

    /// The running backend, between init and exit
    pub fn backend(&self) -> Option<Arc<Loopback>> {
        self.state.clone()
    }
}

/// Trigger that forwards to the backend while it is alive
fn forward<T>(
    state: &Arc<Loopback>,
    f: impl Fn(&Arc<Loopback>, &T) + Send + Sync + 'static,
) -> impl Fn(&T) + Send + Sync + 'static {
    let weak: Weak<Loopback> = Arc::downgrade(state);
    move |payload: &T| {
        if let Some(state) = weak.upgrade() {
            f(&state, payload);
        }
    }
}

impl Module for LoopbackModule {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn init(&mut self, ctx: &Arc<CommContext>) -> Result<()> {
        let flags = BackendFlags::CALL | BackendFlags::MESSAGE;
        let id = ctx.backends.add(
            MODULE_NAME,
            vec![Scheme::new(SCHEME, flags)],
            flags,
            Some(Arc::new(is_valid_identifier)),
        );
        let state = Arc::new(Loopback {
            id,
            pipes: ctx.pipes.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
            calls: Mutex::new(HashMap::new()),
        });

        let pipes = &ctx.pipes;
        self.registrations = vec![
            pipes
                .call_dial
                .add_trigger(MODULE_NAME, forward(&state, |s, call: &Call| s.on_dial(call))),
            pipes
                .call_accept
                .add_trigger(MODULE_NAME, forward(&state, |s, call: &Call| s.on_accept(call))),
            pipes.call_hold.add_trigger(MODULE_NAME, |call: &Call| {
                warn!("Hold of {} unhandled", call.key());
            }),
            pipes
                .call_hangup
                .add_trigger(MODULE_NAME, forward(&state, |s, call: &Call| s.on_hangup(call))),
            pipes.message_send.add_trigger(
                MODULE_NAME,
                forward(&state, |s, message: &Message| s.on_message_send(message)),
            ),
        ];
        debug!("Loopback backend enabled with id {}", id);
        self.state = Some(state);
        Ok(())
    }

    fn exit(&mut self, ctx: &Arc<CommContext>) -> ExitStatus {
        let pipes = &ctx.pipes;
        let registrations = std::mem::take(&mut self.registrations);
        if let [dial, accept, hold, hangup, send] = registrations.as_slice() {
            pipes.call_dial.remove(dial);
            pipes.call_accept.remove(accept);
            pipes.call_hold.remove(hold);
            pipes.call_hangup.remove(hangup);
            pipes.message_send.remove(send);
        }
        if let Some(state) = self.state.take() {
            ctx.backends.remove(state.id);
        }
        ExitStatus::Done
    }
}
