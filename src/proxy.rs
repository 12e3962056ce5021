//! # Managed Wrapper Composite
//!
//! One disposable unit representing one native object identity, composing
//! the handle lifetime manager and the signal bridge.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PROXY LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  attach(id, Owned | Borrowed)                                           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   live ──── invoke / subscribe / unsubscribe ────┐                      │
//! │        │                                         │ (UI-affined)         │
//! │        ▼                                         │                      │
//! │   dispose()            ┌── on the UI thread ─────┘                      │
//! │     1. disconnect every signal binding                                  │
//! │     2. release the handle (destroy iff owning)                          │
//! │     3. drop the registry entry                                          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   disposed ── any further use ──► UseAfterRelease                       │
//! │                                                                         │
//! │   Drop off-thread: mark released, queue plain-data teardown entry,      │
//! │   never touch native state from the wrong thread.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wrapper kinds are built by composition: a typed wrapper holds an
//! `Arc<Proxy>` and adds capability methods, rather than inheriting from a
//! base-handle hierarchy.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::context::{DeferredRelease, UiContext};
use crate::error::Result;
use crate::event::{EventPayload, SignalResponse};
use crate::handle::{NativeHandle, Ownership};
use crate::native::{NativeInterface, RawId};
use crate::registry::WrapperRegistry;
use crate::signal::{SignalBridge, SubscriptionId};

/// Whether a wrapper's mutation and disposal are confined to the UI thread
///
/// UI-affined resources (widgets, input-method contexts) corrupt native
/// state when touched from a foreign thread; service handles without that
/// requirement opt out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Mutation and disposal only on the UI-affined context
    UiThread,
    /// No thread confinement beyond the native layer's own rules
    AnyThread,
}

/// Managed wrapper over one native object
pub struct Proxy {
    handle: NativeHandle,
    bridge: Arc<SignalBridge>,
    ctx: Arc<UiContext>,
    registry: Arc<WrapperRegistry>,
    affinity: Affinity,
    weak_self: Weak<Proxy>,
}

impl Proxy {
    /// Attach a wrapper to the native object behind `id`
    ///
    /// Ownership and affinity are explicit, never inferred. Fails with
    /// [`InvalidHandle`](crate::Error::InvalidHandle) for a null/unknown id
    /// and [`DuplicateOwner`](crate::Error::DuplicateOwner) when an owning
    /// wrapper already fronts the id; a rejected wrapper never destroys the
    /// object.
    pub fn attach(
        native: Arc<dyn NativeInterface>,
        ctx: Arc<UiContext>,
        registry: Arc<WrapperRegistry>,
        id: RawId,
        ownership: Ownership,
        affinity: Affinity,
    ) -> Result<Arc<Proxy>> {
        let handle = NativeHandle::acquire(native.clone(), id, ownership)?;
        let bridge = SignalBridge::new(id, native, ctx.clone());
        let proxy = Arc::new_cyclic(|weak| Proxy {
            handle,
            bridge,
            ctx,
            registry: registry.clone(),
            affinity,
            weak_self: weak.clone(),
        });
        if let Err(err) = registry.register(id, &proxy, ownership == Ownership::Owned) {
            // This wrapper failed to claim the object; it must not free it.
            proxy.handle.disown();
            return Err(err);
        }
        tracing::debug!(id = %id, ?ownership, ?affinity, "wrapper attached");
        Ok(proxy)
    }

    /// The native id this wrapper fronts
    pub fn id(&self) -> RawId {
        self.handle.id()
    }

    /// The underlying handle
    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    /// Whether the wrapper has been disposed
    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }

    /// This wrapper's thread confinement
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn guard(&self) -> Result<()> {
        if self.affinity == Affinity::UiThread {
            self.ctx.ensure_current()?;
        }
        self.handle.assert_valid()
    }

    /// Synchronous call/return hand-off to the native layer
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.guard()?;
        self.handle.native().invoke(self.id(), method, args)
    }

    /// Subscribe a managed handler to `signal`
    ///
    /// The first subscriber triggers the native trampoline registration; see
    /// [`SignalBridge::subscribe`].
    pub fn subscribe<F>(&self, signal: &str, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&EventPayload) -> Option<SignalResponse> + Send + Sync + 'static,
    {
        self.guard()?;
        self.bridge.subscribe(signal, handler)
    }

    /// Detach a subscriber; unknown tokens and already-disposed wrappers are
    /// a no-op (idempotent detachment during teardown)
    pub fn unsubscribe(&self, signal: &str, subscription: SubscriptionId) -> Result<()> {
        if self.affinity == Affinity::UiThread {
            self.ctx.ensure_current()?;
        }
        if self.handle.is_released() {
            return Ok(());
        }
        self.bridge.unsubscribe(signal, subscription);
        Ok(())
    }

    /// Current subscriber count for `signal`
    pub fn subscriber_count(&self, signal: &str) -> usize {
        self.bridge.subscriber_count(signal)
    }

    /// Dispose the wrapper: disconnect every signal binding, then release
    /// the handle
    ///
    /// Idempotent; fails with [`WrongThread`](crate::Error::WrongThread)
    /// when a UI-affined wrapper is disposed from a foreign thread.
    pub fn dispose(&self) -> Result<()> {
        if self.handle.is_released() {
            return Ok(());
        }
        if self.affinity == Affinity::UiThread {
            self.ctx.ensure_current()?;
        }
        self.bridge.disconnect_all();
        self.handle.release();
        self.registry.remove(self.id(), &self.weak_self);
        tracing::debug!(id = %self.id(), "wrapper disposed");
        Ok(())
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        if self.handle.is_released() {
            return;
        }
        if self.ctx.is_current() {
            // Collector-style drop on the right thread: tear down inline.
            self.bridge.disconnect_all();
            self.handle.release();
            self.registry.remove(self.handle.id(), &self.weak_self);
            return;
        }
        // Foreign thread: never touch native state from here. Mark the
        // handle released and hand the queue a plain-data entry.
        let Some(destroy) = self.handle.mark_released_for_deferral() else {
            return;
        };
        let signals = self.bridge.take_registered_signals();
        if destroy || !signals.is_empty() {
            self.ctx.enqueue_release(DeferredRelease::new(
                self.handle.id(),
                self.handle.native().clone(),
                signals,
                destroy,
            ));
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("handle", &self.handle)
            .field("affinity", &self.affinity)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
