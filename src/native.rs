//! # Native Seam
//!
//! The only external boundary of the runtime: a call/return interface plus an
//! asynchronous callback-registration interface, both expressed as the
//! [`NativeInterface`] trait so that embedders can plug in a real platform
//! binding and tests can plug in an in-process double.
//!
//! ## Contract
//!
//! - `invoke` is a synchronous hand-off; the native layer may block, that
//!   latency is opaque to this runtime.
//! - A registered [`Trampoline`] receives a payload pointer view that is
//!   valid only for the duration of the call. Nothing borrowed from a
//!   [`NativePayload`] may outlive the trampoline invocation.
//! - `destroy` is safe to issue at most once per owned handle. The runtime
//!   enforces the at-most-once part (see [`crate::handle::NativeHandle`]).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::event::SignalResponse;

// ============================================================================
// RAW IDENTIFIERS
// ============================================================================

/// Opaque identifier for a native object
///
/// The runtime never interprets the value; it only compares it and hands it
/// back across the seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(u64);

impl RawId {
    /// The null reference, never a valid object
    pub const NULL: RawId = RawId(0);

    /// Wrap a raw identifier value
    pub const fn new(raw: u64) -> Self {
        RawId(raw)
    }

    /// Whether this is the null reference
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The underlying raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

// ============================================================================
// BORROWED PAYLOAD VIEW
// ============================================================================

/// One field of a native event payload, borrowed from native memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue<'a> {
    /// Absent value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 text, valid only for the duration of the callback
    Str(&'a str),
    /// Raw bytes, valid only for the duration of the callback
    Bytes(&'a [u8]),
}

/// Borrowed view of the payload the native layer passes to a trampoline
///
/// Valid only for the duration of the trampoline call; the bridge copies it
/// into an owned [`crate::event::EventPayload`] before doing anything else.
#[derive(Debug, Clone, Copy)]
pub struct NativePayload<'a> {
    fields: &'a [(&'a str, NativeValue<'a>)],
}

impl<'a> NativePayload<'a> {
    /// An empty payload (signals that carry no data)
    pub const EMPTY: NativePayload<'static> = NativePayload { fields: &[] };

    /// Wrap a borrowed field list
    pub fn new(fields: &'a [(&'a str, NativeValue<'a>)]) -> Self {
        NativePayload { fields }
    }

    /// Iterate the fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, NativeValue<'a>)> + '_ {
        self.fields.iter().copied()
    }
}

// ============================================================================
// NATIVE INTERFACE
// ============================================================================

/// The single registered callback per signal
///
/// Receives all native events for that signal and fans them out to managed
/// subscribers. Returns a response value for response-bearing signals; plain
/// signals ignore it.
pub type Trampoline = Arc<dyn for<'a> Fn(NativePayload<'a>) -> SignalResponse + Send + Sync>;

/// Call/return and callback-registration surface of the native layer
///
/// Implementations must be safe to call from any thread: the runtime itself
/// confines wrapper mutation to the UI-affined context, but deferred releases
/// and trampoline bookkeeping can originate elsewhere.
pub trait NativeInterface: Send + Sync {
    /// Whether `id` currently denotes a live native object
    fn is_valid(&self, id: RawId) -> bool;

    /// Destroy the native object behind `id`
    ///
    /// Callers must guarantee at most one call per owned handle.
    fn destroy(&self, id: RawId);

    /// Synchronous call/return operation on the object behind `id`
    fn invoke(&self, id: RawId, method: &str, args: &[Value]) -> Result<Value>;

    /// Register the trampoline for `signal` on the object behind `id`
    ///
    /// Fails when the native layer rejects the registration, e.g. the object
    /// is already released or the service is unsupported on this device.
    fn register_signal(&self, id: RawId, signal: &str, trampoline: Trampoline) -> Result<()>;

    /// Unregister the trampoline for `signal`; unknown registrations are a
    /// no-op
    fn unregister_signal(&self, id: RawId, signal: &str);
}

// ============================================================================
// TEST DOUBLE
// ============================================================================

#[cfg(test)]
pub(crate) mod fake {
    //! In-process stand-in for the native layer used across the crate's
    //! tests: records destroy counts and registrations, serves canned invoke
    //! results, and can fire registered trampolines like the real layer
    //! would.

    use std::collections::{HashMap, HashSet};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Inner {
        live: HashSet<RawId>,
        destroy_counts: HashMap<RawId, u32>,
        trampolines: HashMap<(RawId, String), Trampoline>,
        register_calls: u32,
        unregister_calls: u32,
        refuse_registration: bool,
        invoke_log: Vec<(RawId, String)>,
        canned: HashMap<String, Value>,
    }

    pub(crate) struct FakeNative {
        inner: Mutex<Inner>,
    }

    impl FakeNative {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(FakeNative {
                inner: Mutex::new(Inner::default()),
            })
        }

        /// Make `id` a live native object.
        pub(crate) fn add_object(&self, id: RawId) {
            self.inner.lock().live.insert(id);
        }

        pub(crate) fn destroy_count(&self, id: RawId) -> u32 {
            self.inner.lock().destroy_counts.get(&id).copied().unwrap_or(0)
        }

        pub(crate) fn is_registered(&self, id: RawId, signal: &str) -> bool {
            self.inner
                .lock()
                .trampolines
                .contains_key(&(id, signal.to_string()))
        }

        pub(crate) fn register_calls(&self) -> u32 {
            self.inner.lock().register_calls
        }

        pub(crate) fn unregister_calls(&self) -> u32 {
            self.inner.lock().unregister_calls
        }

        pub(crate) fn refuse_registrations(&self, refuse: bool) {
            self.inner.lock().refuse_registration = refuse;
        }

        pub(crate) fn set_result(&self, method: &str, value: Value) {
            self.inner.lock().canned.insert(method.to_string(), value);
        }

        pub(crate) fn invoked(&self, id: RawId, method: &str) -> bool {
            self.inner
                .lock()
                .invoke_log
                .iter()
                .any(|(i, m)| *i == id && m == method)
        }

        /// Fire the registered trampoline for `signal`, the way the real
        /// native layer would. Returns the trampoline's response, or `None`
        /// when nothing is registered.
        pub(crate) fn fire(
            &self,
            id: RawId,
            signal: &str,
            payload: NativePayload<'_>,
        ) -> Option<SignalResponse> {
            // Clone out of the lock: the trampoline will re-enter this fake
            // when a handler unsubscribes during dispatch.
            let trampoline = self
                .inner
                .lock()
                .trampolines
                .get(&(id, signal.to_string()))
                .cloned();
            trampoline.map(|t| t(payload))
        }
    }

    impl NativeInterface for FakeNative {
        fn is_valid(&self, id: RawId) -> bool {
            self.inner.lock().live.contains(&id)
        }

        fn destroy(&self, id: RawId) {
            let mut inner = self.inner.lock();
            *inner.destroy_counts.entry(id).or_insert(0) += 1;
            inner.live.remove(&id);
        }

        fn invoke(&self, id: RawId, method: &str, _args: &[Value]) -> Result<Value> {
            let mut inner = self.inner.lock();
            inner.invoke_log.push((id, method.to_string()));
            Ok(inner.canned.get(method).cloned().unwrap_or(Value::Null))
        }

        fn register_signal(&self, id: RawId, signal: &str, trampoline: Trampoline) -> Result<()> {
            let mut inner = self.inner.lock();
            if inner.refuse_registration {
                return Err(Error::SignalRegistration {
                    signal: signal.to_string(),
                    reason: "registration refused".to_string(),
                });
            }
            inner.register_calls += 1;
            inner.trampolines.insert((id, signal.to_string()), trampoline);
            Ok(())
        }

        fn unregister_signal(&self, id: RawId, signal: &str) {
            let mut inner = self.inner.lock();
            if inner.trampolines.remove(&(id, signal.to_string())).is_some() {
                inner.unregister_calls += 1;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
