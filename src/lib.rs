//! # Tether Core
//!
//! A handle-lifetime and event-callback bridging runtime for managed
//! wrappers over native platform objects.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TETHER CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │   Handle    │  │   Signal    │  │   Context   │  │   Registry   │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Acquire   │  │ - Subscribe │  │ - Affinity  │  │ - Lookup     │   │
//! │  │ - Release   │  │ - Trampoline│  │ - Marshal   │  │ - One owner  │   │
//! │  │ - Ownership │  │ - Fan-out   │  │ - Deferral  │  │ - Weak refs  │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴───────┬────────┴────────────────┘           │
//! │                                  │                                     │
//! │                          ┌───────▼───────┐                             │
//! │                          │     Proxy     │                             │
//! │                          │               │                             │
//! │                          │ - Invoke      │                             │
//! │                          │ - Dispose     │                             │
//! │                          │ - Drop paths  │                             │
//! │                          └───────┬───────┘                             │
//! │                                  │                                     │
//! │  ┌───────────────────────────────▼───────────────────────────────────┐ │
//! │  │                       Concrete Wrappers                           │ │
//! │  │     wifi  ·  input_method  ·  list_item  ·  metadata              │ │
//! │  └───────────────────────────────┬───────────────────────────────────┘ │
//! │                                  │                                     │
//! │  ════════════════════ NativeInterface seam ════════════════════════   │
//! │                                  │                                     │
//! │                      platform binding (injected)                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire runtime
//! - [`native`] - The injectable seam to the native layer
//! - [`event`] - Owned event payloads and signal responses
//! - [`handle`] - Native-handle lifetime and ownership tracking
//! - [`signal`] - Signal bridges (N subscribers behind one trampoline)
//! - [`context`] - UI-affined context, marshaling and deferred release
//! - [`registry`] - Native-id to wrapper lookup, single-owner policy
//! - [`proxy`] - The composite wrapper core (handle + bridge + context)
//! - [`wrappers`] - Typed wrappers over concrete native services
//!
//! ## Lifetime Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WRAPPER LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Attach                                                              │
//! │     ┌─────────────┐                                                    │
//! │     │ Proxy::     │──► Validate the raw id                             │
//! │     │ attach()    │──► Record ownership (owned / borrowed)             │
//! │     └─────────────┘──► Register with the wrapper registry              │
//! │            │                                                           │
//! │            ▼                                                           │
//! │  2. Active                                                             │
//! │     ┌─────────────┐                                                    │
//! │     │   Live      │◄─► invoke() call/return operations                 │
//! │     │   Wrapper   │◄─► subscribe()/unsubscribe() signal handlers       │
//! │     └─────────────┘◄─► native events fan out to subscribers            │
//! │            │                                                           │
//! │            ▼                                                           │
//! │  3. Teardown (exactly once, signals before handle)                     │
//! │     ┌─────────────┐                                                    │
//! │     │ dispose()   │──► Disconnect every signal                         │
//! │     │ or Drop     │──► Release the handle (destroy iff owned)          │
//! │     └─────────────┘──► Unlink from the registry                        │
//! │                                                                         │
//! │  Off-thread Drop never touches native state inline: it queues a        │
//! │  plain-data release entry the UI-affined context drains later.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod context;
pub mod error;
pub mod event;
pub mod handle;
pub mod native;
pub mod proxy;
pub mod registry;
pub mod signal;
pub mod wrappers;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use context::{DeferredRelease, DispatchTask, UiContext};
pub use error::{Error, Result};
pub use event::{EventPayload, EventValue, SignalResponse};
pub use handle::{NativeHandle, Ownership};
pub use native::{NativeInterface, NativePayload, NativeValue, RawId, Trampoline};
pub use proxy::{Affinity, Proxy};
pub use registry::WrapperRegistry;
pub use signal::{SignalBridge, SignalHandler, SubscriptionId};

// ============================================================================
// RUNTIME INSTANCE
// ============================================================================

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;

/// Global Tether runtime instance
static RUNTIME_INSTANCE: OnceCell<Arc<RwLock<Runtime>>> = OnceCell::new();

/// The runtime instance that ties the shared pieces together
///
/// Embedders that want a single process-wide context and registry initialize
/// the runtime once from their UI thread and hand its parts to every wrapper
/// they attach. Tests skip the global entirely and construct a
/// [`UiContext`] and [`WrapperRegistry`] per test.
pub struct Runtime {
    context: Arc<UiContext>,
    registry: Arc<WrapperRegistry>,
    initialized: bool,
}

impl Runtime {
    /// Initialize the global runtime
    ///
    /// Must be called from the thread that will act as the UI-affined
    /// context; that thread is expected to call [`Runtime::drain`] once per
    /// event-loop iteration from then on.
    pub fn initialize() -> Result<()> {
        tracing::info!("Initializing Tether runtime v{}", env!("CARGO_PKG_VERSION"));

        let runtime = Runtime {
            context: UiContext::new(),
            registry: WrapperRegistry::new(),
            initialized: true,
        };

        RUNTIME_INSTANCE
            .set(Arc::new(RwLock::new(runtime)))
            .map_err(|_| Error::AlreadyInitialized)?;

        tracing::info!("Tether runtime initialized");
        Ok(())
    }

    /// Get the global runtime instance
    ///
    /// Returns an error if the runtime hasn't been initialized.
    pub fn instance() -> Result<Arc<RwLock<Runtime>>> {
        RUNTIME_INSTANCE.get().cloned().ok_or(Error::NotInitialized)
    }

    /// Check if the runtime is initialized
    pub fn is_initialized() -> bool {
        RUNTIME_INSTANCE.get().is_some()
    }

    /// The process-wide UI-affined context
    pub fn context(&self) -> Arc<UiContext> {
        self.context.clone()
    }

    /// The process-wide wrapper registry
    pub fn registry(&self) -> Arc<WrapperRegistry> {
        self.registry.clone()
    }

    /// Drain the marshaling and deferred-release queues
    ///
    /// Called once per event-loop iteration on the UI-affined thread.
    pub fn drain() -> Result<()> {
        let runtime = Self::instance()?;
        let context = runtime.read().context();
        context.drain()
    }

    /// Shut the runtime down
    ///
    /// Drains outstanding queue entries, then forgets every registered
    /// wrapper. Must run on the UI-affined thread.
    pub fn shutdown() -> Result<()> {
        tracing::info!("Shutting down Tether runtime");

        let runtime = Self::instance()?;
        {
            let mut runtime = runtime.write();
            runtime.context.drain()?;
            runtime.registry.clear();
            runtime.initialized = false;
        }

        tracing::info!("Tether runtime shutdown complete");
        Ok(())
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Tether Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
