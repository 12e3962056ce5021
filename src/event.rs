//! # Event Payloads
//!
//! Owned event-argument values handed to managed subscribers, and the
//! response values handed back to the native layer by response-bearing
//! signals.
//!
//! A [`NativePayload`](crate::native::NativePayload) is only valid for the
//! duration of a trampoline call, so the first thing the bridge does is copy
//! it, field by field, into an [`EventPayload`]. From that point on no
//! reference to native memory exists anywhere in managed code.

use serde::{Deserialize, Serialize};

use crate::native::{NativePayload, NativeValue};

// ============================================================================
// EVENT VALUES
// ============================================================================

/// One owned field value of an event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventValue {
    /// Absent value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Owned UTF-8 text
    Text(String),
    /// Owned raw bytes
    Blob(Vec<u8>),
}

impl From<NativeValue<'_>> for EventValue {
    fn from(value: NativeValue<'_>) -> Self {
        match value {
            NativeValue::Null => EventValue::Null,
            NativeValue::Bool(b) => EventValue::Bool(b),
            NativeValue::Int(i) => EventValue::Int(i),
            NativeValue::Float(f) => EventValue::Float(f),
            NativeValue::Str(s) => EventValue::Text(s.to_owned()),
            NativeValue::Bytes(b) => EventValue::Blob(b.to_vec()),
        }
    }
}

// ============================================================================
// EVENT PAYLOAD
// ============================================================================

/// Owned, lossless copy of a native event payload
///
/// Field order is preserved from the native payload so that typed wrappers
/// can log and convert deterministically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventPayload {
    fields: Vec<(String, EventValue)>,
}

impl EventPayload {
    /// An empty payload
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy every field out of a borrowed native payload
    ///
    /// This is the marshaling step: after it returns, nothing borrowed from
    /// native memory survives.
    pub fn copy_from(native: NativePayload<'_>) -> Self {
        EventPayload {
            fields: native
                .fields()
                .map(|(name, value)| (name.to_owned(), EventValue::from(value)))
                .collect(),
        }
    }

    /// Builder-style field append, used by typed wrappers and tests
    pub fn with(mut self, name: &str, value: EventValue) -> Self {
        self.fields.push((name.to_owned(), value));
        self
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&EventValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Integer field accessor
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(EventValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Boolean field accessor
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(EventValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Text field accessor
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(EventValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Iterate fields in their original order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &EventValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload carries no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// SIGNAL RESPONSE
// ============================================================================

/// Value returned to the native layer by a response-bearing signal
///
/// The native layer dereferences whatever comes back, so a response is always
/// a freshly constructed owned value, never a stale or null native
/// reference. [`SignalResponse::empty`] is the neutral default used when no
/// subscriber supplies a response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalResponse {
    payload: EventPayload,
}

impl SignalResponse {
    /// Freshly constructed neutral response
    pub fn empty() -> Self {
        Self::default()
    }

    /// Response carrying the given fields
    pub fn from_payload(payload: EventPayload) -> Self {
        SignalResponse { payload }
    }

    /// The response fields
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }
}

// ============================================================================
// TESTS
// ============================================================================
