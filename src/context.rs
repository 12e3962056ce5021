//! # UI-Affined Context
//!
//! The single logical execution context that owns all wrapper mutation and
//! disposal. Native callbacks arrive on arbitrary threads; everything that
//! would touch wrapper state off-thread is turned into queue entries the
//! embedding event loop drains once per iteration.
//!
//! Two queues:
//! - **Dispatch queue** - events that arrived off-thread, already copied
//!   into owned payloads, waiting to be re-dispatched to subscribers.
//! - **Deferred release queue** - handles whose wrappers were dropped by a
//!   collector-style path on a foreign thread. Entries are plain data (raw
//!   id + the interface to free it through), never live object references,
//!   so queue order cannot resurrect collector-order nondeterminism.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::native::{NativeInterface, RawId};

/// Work item queued for re-dispatch on the UI-affined thread
pub type DispatchTask = Box<dyn FnOnce() + Send>;

// ============================================================================
// DEFERRED RELEASE ENTRIES
// ============================================================================

/// Plain-data record of one native object's pending teardown
///
/// Created when a wrapper is dropped off-thread: carries the raw id, the
/// signal names still registered with the native layer, and whether the
/// object itself must be destroyed. The originating handle is already marked
/// released, so the destroy below runs exactly once.
pub struct DeferredRelease {
    id: RawId,
    native: Arc<dyn NativeInterface>,
    signals: Vec<String>,
    destroy: bool,
}

impl DeferredRelease {
    pub(crate) fn new(
        id: RawId,
        native: Arc<dyn NativeInterface>,
        signals: Vec<String>,
        destroy: bool,
    ) -> Self {
        DeferredRelease {
            id,
            native,
            signals,
            destroy,
        }
    }

    /// The native id this entry tears down
    pub fn id(&self) -> RawId {
        self.id
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// The UI-affined execution context
///
/// Binds to the thread that creates it. Created once at process start by the
/// runtime (or per test for isolation); the embedding event loop calls
/// [`UiContext::drain`] each iteration.
pub struct UiContext {
    thread: ThreadId,
    dispatch_queue: Mutex<VecDeque<DispatchTask>>,
    release_queue: Mutex<VecDeque<DeferredRelease>>,
}

impl UiContext {
    /// Create a context bound to the calling thread
    pub fn new() -> Arc<Self> {
        Arc::new(UiContext {
            thread: thread::current().id(),
            dispatch_queue: Mutex::new(VecDeque::new()),
            release_queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Whether the calling thread is the UI-affined thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Fail with [`Error::WrongThread`] off the UI-affined thread
    pub fn ensure_current(&self) -> Result<()> {
        if !self.is_current() {
            return Err(Error::WrongThread);
        }
        Ok(())
    }

    /// Queue an off-thread event for re-dispatch on the next drain
    pub fn enqueue_dispatch(&self, task: DispatchTask) {
        self.dispatch_queue.lock().push_back(task);
    }

    /// Queue an owned handle for destruction on the next drain
    pub fn enqueue_release(&self, entry: DeferredRelease) {
        tracing::debug!(id = %entry.id, "native release deferred to UI-affined context");
        self.release_queue.lock().push_back(entry);
    }

    /// Number of events waiting for re-dispatch
    pub fn pending_dispatches(&self) -> usize {
        self.dispatch_queue.lock().len()
    }

    /// Number of handles waiting for destruction
    pub fn pending_releases(&self) -> usize {
        self.release_queue.lock().len()
    }

    /// Drain both queues; called once per event-loop iteration
    ///
    /// Only what was queued before the call is processed: a task that
    /// enqueues further work sees it handled on the next iteration. Fails
    /// with [`Error::WrongThread`] off the UI-affined thread.
    pub fn drain(&self) -> Result<()> {
        self.ensure_current()?;

        let tasks: Vec<DispatchTask> = self.dispatch_queue.lock().drain(..).collect();
        for task in tasks {
            task();
        }

        let releases: Vec<DeferredRelease> = self.release_queue.lock().drain(..).collect();
        for entry in releases {
            // Same teardown order as an explicit dispose: signals first,
            // then the object.
            for signal in &entry.signals {
                entry.native.unregister_signal(entry.id, signal);
            }
            if entry.destroy {
                tracing::debug!(id = %entry.id, "destroying native object from deferred queue");
                entry.native.destroy(entry.id);
            }
        }
        Ok(())
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        let pending = self.release_queue.lock().len();
        if pending > 0 {
            tracing::warn!(
                pending,
                "UI-affined context dropped with undestroyed native objects"
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
