//! In-process publish/subscribe bus for agent signalling.
//!
//! Delivery is synchronous and in registration order. A failing or
//! panicking handler is recorded in the [`DeliveryReport`] and never stops
//! delivery to the handlers after it.
//!
//! `wait_for` registers a single-fire wait with a deadline in ticks; the
//! orchestrator polls it each tick instead of blocking, so other scheduled
//! work keeps running while it waits.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::config::BUS_LOG_CAPACITY;
use crate::resilience::panic_message;

/// Event type names used across the engine.
pub mod topics {
    pub const CRISIS_STARTED: &str = "CRISIS_STARTED";
    pub const CRITICAL_THREAT: &str = "CRITICAL_THREAT";
    pub const ASSESSMENT_COMPLETE: &str = "ASSESSMENT_COMPLETE";
    pub const MITIGATION_FAILED: &str = "MITIGATION_FAILED";
    pub const PLAN_READY: &str = "PLAN_READY";
    pub const NEGOTIATION_COMPLETE: &str = "NEGOTIATION_COMPLETE";
    pub const HUMAN_APPROVAL_GIVEN: &str = "HUMAN_APPROVAL_GIVEN";
    pub const MITIGATION_INTERRUPT: &str = "MITIGATION_INTERRUPT";
    pub const CRISIS_RESOLVED: &str = "CRISIS_RESOLVED";
    pub const CRISIS_ABORTED: &str = "CRISIS_ABORTED";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub tick: u64,
}

pub type Handler = Box<dyn FnMut(&BusEvent) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaitHandle(u64);

struct Subscription {
    id: SubscriptionId,
    event_type: String,
    subscriber: String,
    once: bool,
    handler: Handler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscriber: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
    /// Waits resolved by this emit.
    pub resolved_waits: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitStatus {
    Pending,
    Resolved(BusEvent),
    TimedOut,
    /// Never issued, cancelled or already consumed.
    Unknown,
}

#[derive(Debug, Clone)]
enum WaitState {
    Pending {
        event_type: String,
        subscriber: String,
        deadline: u64,
    },
    Resolved(BusEvent),
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscriptions: Vec<Subscription>,
    waits: BTreeMap<WaitHandle, WaitState>,
    log: VecDeque<BusEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("waits", &self.waits.len())
            .field("log", &self.log.len())
            .finish()
    }
}

impl EventBus {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn subscribe(
        &mut self,
        event_type: &str,
        subscriber: &str,
        once: bool,
        handler: Handler,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next());
        self.subscriptions.push(Subscription {
            id,
            event_type: event_type.to_string(),
            subscriber: subscriber.to_string(),
            once,
            handler,
        });
        id
    }

    /// Register a handler; keep the id to unsubscribe with [`EventBus::off`].
    pub fn on<F>(&mut self, event_type: &str, subscriber: &str, handler: F) -> SubscriptionId
    where
        F: FnMut(&BusEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(event_type, subscriber, false, Box::new(handler))
    }

    /// Like [`EventBus::on`], removed after its first delivery.
    pub fn once<F>(&mut self, event_type: &str, subscriber: &str, handler: F) -> SubscriptionId
    where
        F: FnMut(&BusEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(event_type, subscriber, true, Box::new(handler))
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.event_type == event_type)
            .count()
    }

    /// Deliver to every current subscriber of `event_type`, then resolve
    /// matching waits.
    pub fn emit(
        &mut self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
        tick: u64,
    ) -> DeliveryReport {
        let event = BusEvent {
            event_type: event_type.to_string(),
            source: source.to_string(),
            payload,
            tick,
        };
        let mut report = DeliveryReport::default();
        let mut spent = Vec::new();

        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.event_type == event_type)
        {
            let outcome = catch_unwind(AssertUnwindSafe(|| (sub.handler)(&event)));
            report.delivered += 1;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(message)) => Some(message),
                Err(panic) => Some(panic_message(panic)),
            };
            if let Some(message) = failure {
                report.failures.push(HandlerFailure {
                    subscriber: sub.subscriber.clone(),
                    message,
                });
            }
            if sub.once {
                spent.push(sub.id);
            }
        }
        self.subscriptions.retain(|s| !spent.contains(&s.id));

        for state in self.waits.values_mut() {
            let matches = matches!(
                &*state,
                WaitState::Pending { event_type: t, deadline, .. }
                    if t.as_str() == event_type && tick <= *deadline
            );
            if matches {
                *state = WaitState::Resolved(event.clone());
                report.resolved_waits += 1;
            }
        }

        if self.log.len() == BUS_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(event);
        report
    }

    /// Single-fire wait for `event_type`, expiring `timeout_ticks` after `now`.
    pub fn wait_for(
        &mut self,
        event_type: &str,
        subscriber: &str,
        timeout_ticks: u64,
        now: u64,
    ) -> WaitHandle {
        let handle = WaitHandle(self.next());
        self.waits.insert(
            handle,
            WaitState::Pending {
                event_type: event_type.to_string(),
                subscriber: subscriber.to_string(),
                deadline: now.saturating_add(timeout_ticks),
            },
        );
        handle
    }

    /// Check a wait. `Resolved` and `TimedOut` are reported once; the wait
    /// is gone afterwards.
    pub fn poll_wait(&mut self, handle: WaitHandle, now: u64) -> WaitStatus {
        let still_pending = match self.waits.get(&handle) {
            None => return WaitStatus::Unknown,
            Some(WaitState::Pending { deadline, .. }) => now <= *deadline,
            Some(WaitState::Resolved(_)) => false,
        };
        if still_pending {
            return WaitStatus::Pending;
        }
        match self.waits.remove(&handle) {
            Some(WaitState::Resolved(event)) => WaitStatus::Resolved(event),
            Some(WaitState::Pending { .. }) => WaitStatus::TimedOut,
            None => WaitStatus::Unknown,
        }
    }

    pub fn cancel_wait(&mut self, handle: WaitHandle) -> bool {
        self.waits.remove(&handle).is_some()
    }

    /// Subscribers currently waiting, for diagnostics.
    pub fn pending_waiters(&self) -> Vec<String> {
        self.waits
            .values()
            .filter_map(|w| match w {
                WaitState::Pending { subscriber, .. } => Some(subscriber.clone()),
                WaitState::Resolved(_) => None,
            })
            .collect()
    }

    /// Rolling log, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &BusEvent> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Drop every subscription, wait and logged event.
    pub fn reset(&mut self) {
        self.subscriptions.clear();
        self.waits.clear();
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let make = move |name: &str| -> Handler {
            let seen = Arc::clone(&seen2);
            let name = name.to_string();
            Box::new(move |_event: &BusEvent| {
                seen.lock().map_err(|e| e.to_string())?.push(name.clone());
                Ok(())
            })
        };
        (seen, make)
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let mut bus = EventBus::default();
        let (seen, make) = recorder();
        bus.on("X", "a", make("a"));
        bus.on("X", "b", make("b"));
        bus.on("Y", "c", make("c"));
        let report = bus.emit("X", "test", serde_json::json!({}), 1);
        assert_eq!(report.delivered, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_failing_handlers_are_isolated() {
        let mut bus = EventBus::default();
        let (seen, make) = recorder();
        bus.on("X", "errs", |_| Err("boom".to_string()));
        bus.on("X", "panics", |_| panic!("handler exploded"));
        bus.on("X", "ok", make("ok"));
        let report = bus.emit("X", "test", serde_json::Value::Null, 1);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].message, "boom");
        assert_eq!(report.failures[1].subscriber, "panics");
        assert!(report.failures[1].message.contains("handler exploded"));
        assert_eq!(*seen.lock().unwrap(), vec!["ok"]);
    }

    #[test]
    fn test_once_and_off() {
        let mut bus = EventBus::default();
        let (seen, make) = recorder();
        bus.once("X", "once", make("once"));
        let id = bus.on("X", "always", make("always"));
        bus.emit("X", "t", serde_json::Value::Null, 1);
        bus.emit("X", "t", serde_json::Value::Null, 2);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit("X", "t", serde_json::Value::Null, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["once", "always", "always"]);
        assert_eq!(bus.subscriber_count("X"), 0);
    }

    #[test]
    fn test_wait_resolves_once() {
        let mut bus = EventBus::default();
        let handle = bus.wait_for(topics::HUMAN_APPROVAL_GIVEN, "governance", 100, 10);
        assert_eq!(bus.poll_wait(handle, 11), WaitStatus::Pending);
        let report = bus.emit(
            topics::HUMAN_APPROVAL_GIVEN,
            "ui",
            serde_json::json!({"approver": "mayor"}),
            12,
        );
        assert_eq!(report.resolved_waits, 1);
        match bus.poll_wait(handle, 13) {
            WaitStatus::Resolved(event) => assert_eq!(event.payload["approver"], "mayor"),
            other => panic!("expected resolution, got {other:?}"),
        }
        assert_eq!(bus.poll_wait(handle, 14), WaitStatus::Unknown);
    }

    #[test]
    fn test_wait_times_out() {
        let mut bus = EventBus::default();
        let handle = bus.wait_for("APPROVE", "governance", 5, 0);
        assert_eq!(bus.poll_wait(handle, 5), WaitStatus::Pending);
        assert_eq!(bus.poll_wait(handle, 6), WaitStatus::TimedOut);
        // A late event does not revive it.
        let report = bus.emit("APPROVE", "ui", serde_json::Value::Null, 7);
        assert_eq!(report.resolved_waits, 0);
        assert_eq!(bus.poll_wait(handle, 8), WaitStatus::Unknown);
    }

    #[test]
    fn test_cancel_wait() {
        let mut bus = EventBus::default();
        let handle = bus.wait_for("APPROVE", "governance", 5, 0);
        assert_eq!(bus.pending_waiters(), vec!["governance"]);
        assert!(bus.cancel_wait(handle));
        assert_eq!(bus.poll_wait(handle, 1), WaitStatus::Unknown);
    }

    #[test]
    fn test_log_is_capped_oldest_evicted() {
        let mut bus = EventBus::default();
        for tick in 0..(BUS_LOG_CAPACITY as u64 + 25) {
            bus.emit("TICK", "t", serde_json::Value::Null, tick);
        }
        assert_eq!(bus.log_len(), BUS_LOG_CAPACITY);
        assert_eq!(bus.log().next().map(|e| e.tick), Some(25));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut bus = EventBus::default();
        let (_, make) = recorder();
        bus.on("X", "a", make("a"));
        let handle = bus.wait_for("X", "w", 10, 0);
        bus.emit("Y", "t", serde_json::Value::Null, 0);
        bus.reset();
        assert_eq!(bus.subscriber_count("X"), 0);
        assert_eq!(bus.log_len(), 0);
        assert_eq!(bus.poll_wait(handle, 1), WaitStatus::Unknown);
    }
}
