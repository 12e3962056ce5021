//! # Input-Method Context
//!
//! Wrapper over the platform input-method service. Besides plain
//! notification signals it carries the one response-bearing callback in the
//! system: the native layer delivers an input event and expects an edit
//! decision back on the same call.
//!
//! Input-method state is UI-affined; the wrapper attaches with
//! [`Affinity::UiThread`].

use std::sync::Arc;

use serde_json::json;

use crate::context::UiContext;
use crate::error::Result;
use crate::event::{EventPayload, EventValue, SignalResponse};
use crate::handle::Ownership;
use crate::native::{NativeInterface, RawId};
use crate::proxy::{Affinity, Proxy};
use crate::registry::WrapperRegistry;
use crate::signal::SubscriptionId;

// ============================================================================
// SIGNALS
// ============================================================================

/// Signal names exposed by the native input-method service
pub mod signals {
    /// Input panel activated
    pub const ACTIVATED: &str = "Activated";
    /// Input event delivered, edit decision expected back
    pub const EVENT_RECEIVED: &str = "EventReceived";
    /// Panel visibility status changed
    pub const STATUS_CHANGED: &str = "StatusChanged";
    /// Panel resized
    pub const RESIZED: &str = "Resized";
    /// Input language changed
    pub const LANGUAGE_CHANGED: &str = "LanguageChanged";
    /// Keyboard type changed
    pub const KEYBOARD_TYPE_CHANGED: &str = "KeyboardTypeChanged";
}

// ============================================================================
// EVENT DATA
// ============================================================================

/// Kind of input event the native layer delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    /// No event
    Void,
    /// Pre-edit text changed
    Preedit,
    /// Text committed
    Commit,
    /// Surrounding text deletion requested
    DeleteSurrounding,
    /// Surrounding text requested
    GetSurrounding,
    /// Private command from the input panel
    PrivateCommand,
}

impl InputEventKind {
    fn from_code(code: i64) -> Self {
        match code {
            1 => InputEventKind::Preedit,
            2 => InputEventKind::Commit,
            3 => InputEventKind::DeleteSurrounding,
            4 => InputEventKind::GetSurrounding,
            5 => InputEventKind::PrivateCommand,
            _ => InputEventKind::Void,
        }
    }
}

/// Data carried by [`signals::EVENT_RECEIVED`]
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// What happened
    pub kind: InputEventKind,
    /// Predictive/committed text
    pub predictive_string: String,
    /// Cursor offset relative to the current position
    pub cursor_offset: i64,
    /// Number of characters affected
    pub number_of_chars: i64,
}

impl InputEvent {
    fn from_payload(payload: &EventPayload) -> Self {
        InputEvent {
            kind: InputEventKind::from_code(payload.int("event").unwrap_or(0)),
            predictive_string: payload.text("predictive_string").unwrap_or("").to_owned(),
            cursor_offset: payload.int("cursor_offset").unwrap_or(0),
            number_of_chars: payload.int("number_of_chars").unwrap_or(0),
        }
    }
}

/// Edit decision returned to the native layer for
/// [`signals::EVENT_RECEIVED`]
///
/// The default value is the neutral decision: no update, cursor untouched,
/// no text, no pre-edit reset. The bridge hands the native layer a freshly
/// constructed neutral response whenever no subscriber supplies one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitResponse {
    /// Whether the text field should update
    pub update: bool,
    /// New cursor position
    pub cursor_position: i64,
    /// Replacement text
    pub current_text: String,
    /// Whether the pre-edit state must be reset
    pub preedit_reset_required: bool,
}

impl CommitResponse {
    fn into_signal_response(self) -> SignalResponse {
        SignalResponse::from_payload(
            EventPayload::empty()
                .with("update", EventValue::Bool(self.update))
                .with("cursor_position", EventValue::Int(self.cursor_position))
                .with("current_text", EventValue::Text(self.current_text))
                .with(
                    "preedit_reset_required",
                    EventValue::Bool(self.preedit_reset_required),
                ),
        )
    }
}

// ============================================================================
// CONTEXT WRAPPER
// ============================================================================

/// Managed wrapper over the native input-method context
pub struct InputMethodContext {
    proxy: Arc<Proxy>,
}

impl InputMethodContext {
    /// Attach to an input-method context object
    ///
    /// The native layer hands the context out either freshly constructed
    /// (owned) or as a reference to its singleton (borrowed); the caller
    /// states which explicitly.
    pub fn attach(
        native: Arc<dyn NativeInterface>,
        ctx: Arc<UiContext>,
        registry: Arc<WrapperRegistry>,
        id: RawId,
        ownership: Ownership,
    ) -> Result<Self> {
        let proxy = Proxy::attach(native, ctx, registry, id, ownership, Affinity::UiThread)?;
        Ok(InputMethodContext { proxy })
    }

    /// The underlying proxy
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Activate the input context
    pub fn activate(&self) -> Result<()> {
        self.proxy.invoke("imf_activate", &[]).map(drop)
    }

    /// Deactivate the input context
    pub fn deactivate(&self) -> Result<()> {
        self.proxy.invoke("imf_deactivate", &[]).map(drop)
    }

    /// Reset pre-edit state
    pub fn reset(&self) -> Result<()> {
        self.proxy.invoke("imf_reset", &[]).map(drop)
    }

    /// Whether the context reactivates after focus loss
    pub fn restore_after_focus_lost(&self) -> Result<bool> {
        let value = self.proxy.invoke("imf_restore_after_focus_lost", &[])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Control reactivation after focus loss
    pub fn set_restore_after_focus_lost(&self, toggle: bool) -> Result<()> {
        self.proxy
            .invoke("imf_set_restore_after_focus_lost", &[json!(toggle)])
            .map(drop)
    }

    /// Move the cursor
    pub fn set_cursor_position(&self, position: u32) -> Result<()> {
        self.proxy
            .invoke("imf_set_cursor_position", &[json!(position)])
            .map(drop)
    }

    /// Tell the input panel the cursor moved
    pub fn notify_cursor_position(&self) -> Result<()> {
        self.proxy.invoke("imf_notify_cursor_position", &[]).map(drop)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Subscribe to panel activation
    pub fn on_activated<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::ACTIVATED, move |_| {
            handler();
            None
        })
    }

    /// Subscribe to panel visibility changes
    pub fn on_status_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::STATUS_CHANGED, move |payload| {
            handler(payload.flag("visible").unwrap_or(false));
            None
        })
    }

    /// Subscribe to language changes
    pub fn on_language_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::LANGUAGE_CHANGED, move |_| {
            handler();
            None
        })
    }

    /// Subscribe to panel geometry changes
    pub fn on_resized<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::RESIZED, move |_| {
            handler();
            None
        })
    }

    /// Subscribe to keyboard type changes
    pub fn on_keyboard_type_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.proxy
            .subscribe(signals::KEYBOARD_TYPE_CHANGED, move |payload| {
                handler(payload.int("keyboard_type").unwrap_or(0));
                None
            })
    }

    /// Subscribe to input events and answer with an edit decision
    ///
    /// Return `None` to abstain; when every subscriber abstains the native
    /// layer receives the neutral [`CommitResponse`]. With several
    /// subscribers the last decision wins.
    pub fn on_event_received<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(InputEvent) -> Option<CommitResponse> + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::EVENT_RECEIVED, move |payload| {
            handler(InputEvent::from_payload(payload)).map(CommitResponse::into_signal_response)
        })
    }

    /// Detach a previously registered subscriber
    pub fn unsubscribe(&self, signal: &str, subscription: SubscriptionId) -> Result<()> {
        self.proxy.unsubscribe(signal, subscription)
    }

    /// Dispose the wrapper
    pub fn dispose(&self) -> Result<()> {
        self.proxy.dispose()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use parking_lot::Mutex as PlMutex;

    use super::*;
    use crate::native::fake::FakeNative;
    use crate::native::{NativePayload, NativeValue};

    fn context(ownership: Ownership) -> (Arc<FakeNative>, InputMethodContext, RawId) {
        let native = FakeNative::new();
        let ctx = UiContext::new();
        let registry = WrapperRegistry::new();
        let id = RawId::new(0x20);
        native.add_object(id);
        let imf = InputMethodContext::attach(
            native.clone() as Arc<dyn NativeInterface>,
            ctx,
            registry,
            id,
            ownership,
        )
        .unwrap();
        (native, imf, id)
    }

    fn commit_payload<'a>(text: &'a str) -> [(&'a str, NativeValue<'a>); 4] {
        [
            ("event", NativeValue::Int(2)),
            ("predictive_string", NativeValue::Str(text)),
            ("cursor_offset", NativeValue::Int(1)),
            ("number_of_chars", NativeValue::Int(5)),
        ]
    }

    #[test]
    fn test_event_received_reply_comes_from_subscriber() {
        let (native, imf, id) = context(Ownership::Owned);
        imf.on_event_received(|event| {
            assert_eq!(event.kind, InputEventKind::Commit);
            Some(CommitResponse {
                update: true,
                cursor_position: 6,
                current_text: event.predictive_string,
                preedit_reset_required: false,
            })
        })
        .unwrap();

        let fields = commit_payload("hello");
        let reply = native
            .fire(id, signals::EVENT_RECEIVED, NativePayload::new(&fields))
            .expect("trampoline registered");

        assert_eq!(reply.payload().flag("update"), Some(true));
        assert_eq!(reply.payload().int("cursor_position"), Some(6));
        assert_eq!(reply.payload().text("current_text"), Some("hello"));
    }

    #[test]
    fn test_abstaining_subscriber_yields_neutral_reply() {
        let (native, imf, id) = context(Ownership::Owned);
        imf.on_event_received(|_| None).unwrap();

        let fields = commit_payload("ignored");
        let reply = native
            .fire(id, signals::EVENT_RECEIVED, NativePayload::new(&fields))
            .unwrap();

        // Freshly constructed neutral value, never a stale reference.
        assert_eq!(reply, SignalResponse::empty());
    }

    #[test]
    fn test_last_decision_wins_with_multiple_subscribers() {
        let (native, imf, id) = context(Ownership::Owned);
        imf.on_event_received(|_| {
            Some(CommitResponse {
                current_text: "first".into(),
                ..CommitResponse::default()
            })
        })
        .unwrap();
        imf.on_event_received(|_| None).unwrap();
        imf.on_event_received(|_| {
            Some(CommitResponse {
                current_text: "second".into(),
                ..CommitResponse::default()
            })
        })
        .unwrap();

        let fields = commit_payload("x");
        let reply = native
            .fire(id, signals::EVENT_RECEIVED, NativePayload::new(&fields))
            .unwrap();
        assert_eq!(reply.payload().text("current_text"), Some("second"));
    }

    #[test]
    fn test_event_payload_fields_convert_losslessly() {
        let (native, imf, id) = context(Ownership::Owned);
        let seen = Arc::new(PlMutex::new(None));
        {
            let seen = seen.clone();
            imf.on_event_received(move |event| {
                *seen.lock() = Some(event);
                None
            })
            .unwrap();
        }

        let fields = commit_payload("예측");
        native.fire(id, signals::EVENT_RECEIVED, NativePayload::new(&fields));

        let event = seen.lock().clone().unwrap();
        assert_eq!(
            event,
            InputEvent {
                kind: InputEventKind::Commit,
                predictive_string: "예측".to_string(),
                cursor_offset: 1,
                number_of_chars: 5,
            }
        );
    }

    #[test]
    fn test_borrowed_context_dispose_keeps_native_object() {
        let (native, imf, id) = context(Ownership::Borrowed);
        imf.on_activated(|| {}).unwrap();

        imf.dispose().unwrap();

        assert_eq!(native.destroy_count(id), 0);
        assert!(!native.is_registered(id, signals::ACTIVATED));
        assert!(imf.activate().is_err());
    }

    #[test]
    fn test_operations_forward_to_native_calls() {
        let (native, imf, id) = context(Ownership::Owned);

        imf.activate().unwrap();
        imf.set_cursor_position(3).unwrap();
        imf.notify_cursor_position().unwrap();
        imf.reset().unwrap();
        imf.set_restore_after_focus_lost(true).unwrap();
        imf.deactivate().unwrap();

        for method in [
            "imf_activate",
            "imf_set_cursor_position",
            "imf_notify_cursor_position",
            "imf_reset",
            "imf_set_restore_after_focus_lost",
            "imf_deactivate",
        ] {
            assert!(native.invoked(id, method), "missing call: {method}");
        }
    }
}
