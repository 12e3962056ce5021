//! # Signal Bridge
//!
//! Maps N managed subscribers to exactly one native registration per signal
//! name, and fans native events out to managed subscribers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SIGNAL BRIDGE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  subscriber h1 ──┐                                                      │
//! │  subscriber h2 ──┼── SignalBridge ── one trampoline ── native signal   │
//! │  subscriber h3 ──┘        │                                             │
//! │                           │  register on 0→1, unregister on 1→0         │
//! │                           │                                             │
//! │  native event ── trampoline ── copy payload ── fan out in               │
//! │  (any thread)                  (owned)         subscription order       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invariant: a trampoline is registered with the native layer iff the
//! signal's subscriber count is greater than zero.
//!
//! Events arriving off the UI-affined context are copied into owned payloads
//! and queued; the context re-dispatches them on its next drain. A
//! response-bearing event answered off-thread receives a fresh empty
//! response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context::UiContext;
use crate::error::Result;
use crate::event::{EventPayload, SignalResponse};
use crate::native::{NativeInterface, NativePayload, RawId, Trampoline};

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

/// Token identifying one managed subscription
///
/// Returned by [`SignalBridge::subscribe`]; passing it back to
/// [`SignalBridge::unsubscribe`] detaches that subscriber. Unknown tokens are
/// ignored, which makes detachment idempotent during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Managed subscriber callback
///
/// Returns `Some` only for response-bearing signals; plain signals ignore
/// the return value.
pub type SignalHandler = Arc<dyn Fn(&EventPayload) -> Option<SignalResponse> + Send + Sync>;

struct Slot {
    subscribers: Vec<(SubscriptionId, SignalHandler)>,
    /// Claimed under the same lock that guards `subscribers`, so exactly one
    /// subscriber performs the native registration per signal.
    registered: bool,
}

// ============================================================================
// BRIDGE
// ============================================================================

/// Per-wrapper signal bookkeeping: one slot per subscribed signal name
///
/// Subscriber-list mutation is confined to the UI-affined context by the
/// owning [`Proxy`](crate::proxy::Proxy); the bridge itself only adds the
/// locking needed for the trampoline to read a consistent snapshot from an
/// arbitrary thread.
pub struct SignalBridge {
    id: RawId,
    native: Arc<dyn NativeInterface>,
    ctx: Arc<UiContext>,
    slots: Mutex<HashMap<String, Slot>>,
    next_subscription: AtomicU64,
    weak_self: Weak<SignalBridge>,
}

impl SignalBridge {
    /// Create the bridge for the native object behind `id`
    pub fn new(
        id: RawId,
        native: Arc<dyn NativeInterface>,
        ctx: Arc<UiContext>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| SignalBridge {
            id,
            native,
            ctx,
            slots: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            weak_self: weak.clone(),
        })
    }

    /// Attach a managed subscriber to `signal`
    ///
    /// The subscriber going 0→1 claims the native trampoline registration;
    /// if the native layer refuses, the claim rolls back and no subscriber
    /// stays attached.
    pub fn subscribe<F>(&self, signal: &str, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&EventPayload) -> Option<SignalResponse> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));

        // Attach and claim in one critical section: two racing first
        // subscribers must not both register the trampoline.
        let claimed = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(signal.to_owned()).or_insert_with(|| Slot {
                subscribers: Vec::new(),
                registered: false,
            });
            slot.subscribers.push((id, Arc::new(handler)));
            if slot.registered {
                false
            } else {
                slot.registered = true;
                true
            }
        };

        if claimed {
            let trampoline = self.make_trampoline(signal.to_owned());
            if let Err(err) = self.native.register_signal(self.id, signal, trampoline) {
                // The signal cannot deliver events; every subscriber that
                // attached while the claim was in flight goes with it.
                self.slots.lock().remove(signal);
                return Err(err);
            }
            tracing::debug!(id = %self.id, signal, "native trampoline registered");
        }
        Ok(id)
    }

    /// Detach a subscriber; unknown tokens are a no-op
    ///
    /// When the subscriber count drops to zero the native trampoline is
    /// unregistered.
    pub fn unsubscribe(&self, signal: &str, subscription: SubscriptionId) {
        let emptied = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(signal) else {
                return;
            };
            slot.subscribers.retain(|(id, _)| *id != subscription);
            if slot.subscribers.is_empty() {
                let registered = slot.registered;
                slots.remove(signal);
                registered
            } else {
                false
            }
        };
        if emptied {
            self.native.unregister_signal(self.id, signal);
            tracing::debug!(id = %self.id, signal, "native trampoline unregistered");
        }
    }

    /// Number of current subscribers for `signal`
    pub fn subscriber_count(&self, signal: &str) -> usize {
        self.slots
            .lock()
            .get(signal)
            .map(|slot| slot.subscribers.len())
            .unwrap_or(0)
    }

    /// Detach every subscriber and unregister every trampoline
    ///
    /// Teardown path: called by the owning proxy before the handle is
    /// released.
    pub fn disconnect_all(&self) {
        let signals: Vec<String> = self.slots.lock().drain().map(|(name, _)| name).collect();
        for signal in signals {
            self.native.unregister_signal(self.id, &signal);
            tracing::debug!(id = %self.id, signal = %signal, "signal disconnected during teardown");
        }
    }

    /// Clear every slot without touching the native layer
    ///
    /// Off-thread drop path: the returned names travel to the deferred
    /// queue as plain data and are unregistered on the UI-affined thread.
    pub(crate) fn take_registered_signals(&self) -> Vec<String> {
        self.slots.lock().drain().map(|(name, _)| name).collect()
    }

    /// Fan a plain event out to subscribers in subscription order
    pub fn dispatch(&self, signal: &str, payload: EventPayload) {
        self.fan_out(signal, &payload);
    }

    /// Fan a response-bearing event out and collect the reply
    ///
    /// The reply is the last non-`None` subscriber response, or a freshly
    /// constructed empty response when no subscriber answers.
    pub fn dispatch_with_reply(&self, signal: &str, payload: EventPayload) -> SignalResponse {
        self.fan_out(signal, &payload)
            .unwrap_or_else(SignalResponse::empty)
    }

    fn fan_out(&self, signal: &str, payload: &EventPayload) -> Option<SignalResponse> {
        // Snapshot before iterating: a handler may unsubscribe itself or
        // another handler while we are fanning out.
        let snapshot: Vec<(SubscriptionId, SignalHandler)> = {
            let slots = self.slots.lock();
            match slots.get(signal) {
                Some(slot) if !slot.subscribers.is_empty() => slot.subscribers.clone(),
                _ => {
                    // The native layer fired between unregister boundaries.
                    // This comes from uncontrolled native context: log and
                    // drop, never propagate back across the callback.
                    tracing::warn!(
                        id = %self.id,
                        signal,
                        "invariant violation: dispatch with zero subscribers, dropping event"
                    );
                    return None;
                }
            }
        };

        let mut reply = None;
        for (subscription, handler) in snapshot {
            // Re-check membership: a subscriber removed earlier in this same
            // event must not be invoked.
            let still_subscribed = self
                .slots
                .lock()
                .get(signal)
                .map(|slot| slot.subscribers.iter().any(|(id, _)| *id == subscription))
                .unwrap_or(false);
            if !still_subscribed {
                continue;
            }
            if let Some(response) = handler(payload) {
                reply = Some(response);
            }
        }
        reply
    }

    fn make_trampoline(&self, signal: String) -> Trampoline {
        let weak = self.weak_self.clone();
        let ctx = self.ctx.clone();
        Arc::new(move |native_payload: NativePayload<'_>| {
            // First thing: copy out of native memory. Nothing borrowed from
            // the payload survives this line.
            let payload = EventPayload::copy_from(native_payload);
            let Some(bridge) = weak.upgrade() else {
                return SignalResponse::empty();
            };
            if ctx.is_current() {
                bridge.dispatch_with_reply(&signal, payload)
            } else {
                // Marshal onto the UI-affined context; the native caller
                // gets a fresh neutral response.
                let weak = weak.clone();
                let signal = signal.clone();
                ctx.enqueue_dispatch(Box::new(move || {
                    if let Some(bridge) = weak.upgrade() {
                        bridge.dispatch(&signal, payload);
                    }
                }));
                SignalResponse::empty()
            }
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use parking_lot::Mutex as PlMutex;

    use super::*;
    use crate::event::EventValue;
    use crate::native::fake::FakeNative;
    use crate::native::NativeValue;

    fn bridge_over(native: &Arc<FakeNative>, raw: u64) -> Arc<SignalBridge> {
        let id = RawId::new(raw);
        native.add_object(id);
        SignalBridge::new(
            id,
            native.clone() as Arc<dyn NativeInterface>,
            UiContext::new(),
        )
    }

    #[test]
    fn test_two_subscribers_register_once() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        bridge.subscribe("Activated", |_| None).unwrap();
        bridge.subscribe("Activated", |_| None).unwrap();

        assert_eq!(native.register_calls(), 1);
        assert!(native.is_registered(RawId::new(0x1), "Activated"));
        assert_eq!(bridge.subscriber_count("Activated"), 2);
    }

    #[test]
    fn test_count_is_subscribes_minus_unsubscribes() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        let s1 = bridge.subscribe("StateChanged", |_| None).unwrap();
        let s2 = bridge.subscribe("StateChanged", |_| None).unwrap();
        let _s3 = bridge.subscribe("StateChanged", |_| None).unwrap();

        bridge.unsubscribe("StateChanged", s1);
        bridge.unsubscribe("StateChanged", s2);

        assert_eq!(bridge.subscriber_count("StateChanged"), 1);
        assert!(native.is_registered(RawId::new(0x1), "StateChanged"));
        assert_eq!(native.unregister_calls(), 0);
    }

    #[test]
    fn test_unregister_when_last_subscriber_leaves() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        let s1 = bridge.subscribe("Activated", |_| None).unwrap();
        let s2 = bridge.subscribe("Activated", |_| None).unwrap();

        bridge.unsubscribe("Activated", s1);
        assert!(native.is_registered(RawId::new(0x1), "Activated"));

        bridge.unsubscribe("Activated", s2);
        assert!(!native.is_registered(RawId::new(0x1), "Activated"));
        assert_eq!(native.unregister_calls(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_token_is_noop() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        let s1 = bridge.subscribe("Activated", |_| None).unwrap();
        bridge.unsubscribe("Activated", s1);
        // Same token again, and a token for a signal that never existed.
        bridge.unsubscribe("Activated", s1);
        bridge.unsubscribe("NeverSeen", s1);

        assert_eq!(bridge.subscriber_count("Activated"), 0);
    }

    #[test]
    fn test_refused_registration_surfaces_and_adds_nothing() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);
        native.refuse_registrations(true);

        let err = bridge.subscribe("Activated", |_| None).unwrap_err();
        assert_eq!(err.code(), 300);
        assert_eq!(bridge.subscriber_count("Activated"), 0);
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);
        let order = Arc::new(PlMutex::new(Vec::new()));

        for tag in ["h1", "h2", "h3"] {
            let order = order.clone();
            bridge
                .subscribe("Activated", move |_| {
                    order.lock().push(tag);
                    None
                })
                .unwrap();
        }

        bridge.dispatch("Activated", EventPayload::empty());
        assert_eq!(*order.lock(), vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn test_zero_subscriber_dispatch_is_dropped() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        // Never panics, never reaches managed code, returns a neutral reply.
        bridge.dispatch("Ghost", EventPayload::empty());
        let reply = bridge.dispatch_with_reply("Ghost", EventPayload::empty());
        assert_eq!(reply, SignalResponse::empty());
    }

    #[test]
    fn test_handler_unsubscribing_itself_mid_dispatch() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);
        let calls = Arc::new(PlMutex::new(0u32));

        let self_id: Arc<PlMutex<Option<SubscriptionId>>> = Arc::new(PlMutex::new(None));
        let s1 = {
            let bridge_ref = bridge.clone();
            let self_id = self_id.clone();
            let calls = calls.clone();
            bridge
                .subscribe("Activated", move |_| {
                    *calls.lock() += 1;
                    if let Some(id) = *self_id.lock() {
                        bridge_ref.unsubscribe("Activated", id);
                    }
                    None
                })
                .unwrap()
        };
        *self_id.lock() = Some(s1);

        bridge.dispatch("Activated", EventPayload::empty());
        assert_eq!(*calls.lock(), 1);
        assert_eq!(bridge.subscriber_count("Activated"), 0);

        // Excluded from later dispatches; the signal now has no subscribers.
        bridge.dispatch("Activated", EventPayload::empty());
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_handler_removing_a_later_handler_same_event() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);
        let h2_calls = Arc::new(PlMutex::new(0u32));

        let h2_id: Arc<PlMutex<Option<SubscriptionId>>> = Arc::new(PlMutex::new(None));
        {
            let bridge_ref = bridge.clone();
            let h2_id = h2_id.clone();
            bridge
                .subscribe("Activated", move |_| {
                    if let Some(id) = *h2_id.lock() {
                        bridge_ref.unsubscribe("Activated", id);
                    }
                    None
                })
                .unwrap();
        }
        let s2 = {
            let h2_calls = h2_calls.clone();
            bridge
                .subscribe("Activated", move |_| {
                    *h2_calls.lock() += 1;
                    None
                })
                .unwrap()
        };
        *h2_id.lock() = Some(s2);

        // h1 removes h2 before it runs; the membership re-check excludes it
        // from this same event.
        bridge.dispatch("Activated", EventPayload::empty());
        assert_eq!(*h2_calls.lock(), 0);
    }

    #[test]
    fn test_reply_is_last_non_null_response() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        bridge
            .subscribe("EventReceived", |_| {
                Some(SignalResponse::from_payload(
                    EventPayload::empty().with("tag", EventValue::Text("first".into())),
                ))
            })
            .unwrap();
        bridge.subscribe("EventReceived", |_| None).unwrap();
        bridge
            .subscribe("EventReceived", |_| {
                Some(SignalResponse::from_payload(
                    EventPayload::empty().with("tag", EventValue::Text("last".into())),
                ))
            })
            .unwrap();

        let reply = bridge.dispatch_with_reply("EventReceived", EventPayload::empty());
        assert_eq!(reply.payload().text("tag"), Some("last"));
    }

    #[test]
    fn test_trampoline_roundtrip_through_native_layer() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);
        let seen = Arc::new(PlMutex::new(None));

        {
            let seen = seen.clone();
            bridge
                .subscribe("ConnectionStateChanged", move |payload| {
                    *seen.lock() = Some(payload.clone());
                    None
                })
                .unwrap();
        }

        let fields = [
            ("state", NativeValue::Int(3)),
            ("essid", NativeValue::Str("office")),
        ];
        native.fire(
            RawId::new(0x1),
            "ConnectionStateChanged",
            NativePayload::new(&fields),
        );

        let payload = seen.lock().clone().expect("handler invoked");
        assert_eq!(payload.int("state"), Some(3));
        assert_eq!(payload.text("essid"), Some("office"));
    }

    #[test]
    fn test_racing_first_subscribers_register_once() {
        for _ in 0..200 {
            let native = FakeNative::new();
            let bridge = bridge_over(&native, 0x1);
            let barrier = Arc::new(std::sync::Barrier::new(4));

            let threads: Vec<_> = (0..4)
                .map(|_| {
                    let bridge = bridge.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        bridge.subscribe("Activated", |_| None).unwrap();
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }

            assert_eq!(native.register_calls(), 1);
            assert_eq!(bridge.subscriber_count("Activated"), 4);
        }
    }

    #[test]
    fn test_zero_subscriber_dispatch_logs_warning() {
        #[derive(Clone)]
        struct Capture(Arc<PlMutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        let buffer = Arc::new(PlMutex::new(Vec::new()));
        let writer = Capture(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            bridge.dispatch("Ghost", EventPayload::empty());
        });

        let output = String::from_utf8(buffer.lock().clone()).unwrap();
        assert!(output.contains("zero subscribers"), "got: {output}");
    }

    #[test]
    fn test_disconnect_all_unregisters_everything() {
        let native = FakeNative::new();
        let bridge = bridge_over(&native, 0x1);

        bridge.subscribe("Activated", |_| None).unwrap();
        bridge.subscribe("Resized", |_| None).unwrap();
        bridge.subscribe("Resized", |_| None).unwrap();

        bridge.disconnect_all();

        assert!(!native.is_registered(RawId::new(0x1), "Activated"));
        assert!(!native.is_registered(RawId::new(0x1), "Resized"));
        assert_eq!(bridge.subscriber_count("Activated"), 0);
        assert_eq!(bridge.subscriber_count("Resized"), 0);
    }
}
