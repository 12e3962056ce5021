//! # Native Handle Lifetime
//!
//! Single authority for whether a native resource is still valid and who
//! must free it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HANDLE STATE MACHINE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   acquire(id, Owned)      release()          release() (again)         │
//! │  ──────────────────►  live ────────► released ────────► released       │
//! │                        │    destroy()  │                  (no-op)      │
//! │                        │    exactly    │                               │
//! │              disown()  │    once       │  any dereference              │
//! │                        ▼               ▼                               │
//! │                     borrowed      UseAfterRelease                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `released` is the single source of truth, checked-and-set atomically, so
//! the explicit disposal path and the deferred finalizer path can race
//! without ever producing a double free.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::native::{NativeInterface, RawId};

/// Who is responsible for destroying the native object
///
/// Explicit at construction, never inferred: either this side created the
/// object and must destroy it, or the native layer handed out a reference
/// this side may use but must not free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// This side created the native object and must destroy it
    Owned,
    /// The native layer owns the object; this side only reads/writes through it
    Borrowed,
}

/// Wraps a raw native identifier and guarantees deterministic release
pub struct NativeHandle {
    id: RawId,
    /// true→false only, via `disown`
    owns: AtomicBool,
    /// Monotonic: once true, no operation may dereference `id`
    released: AtomicBool,
    native: Arc<dyn NativeInterface>,
}

impl NativeHandle {
    /// Construct a handle over `id`
    ///
    /// Fails with [`Error::InvalidHandle`] when `id` is null or the native
    /// layer does not recognize it.
    pub fn acquire(
        native: Arc<dyn NativeInterface>,
        id: RawId,
        ownership: Ownership,
    ) -> Result<Self> {
        if id.is_null() || !native.is_valid(id) {
            return Err(Error::InvalidHandle(id));
        }
        Ok(NativeHandle {
            id,
            owns: AtomicBool::new(ownership == Ownership::Owned),
            released: AtomicBool::new(false),
            native,
        })
    }

    /// The raw identifier
    pub fn id(&self) -> RawId {
        self.id
    }

    /// Whether this side is responsible for destroying the native object
    pub fn owns(&self) -> bool {
        self.owns.load(Ordering::Acquire)
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Fail with [`Error::UseAfterRelease`] once released
    pub fn assert_valid(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::UseAfterRelease(self.id));
        }
        Ok(())
    }

    /// Give up ownership without releasing
    ///
    /// The only permitted ownership transition (owned → borrowed); used when
    /// the native layer takes responsibility for the object back, or to
    /// neutralize a handle whose registration was rejected.
    pub fn disown(&self) {
        self.owns.store(false, Ordering::Release);
    }

    /// Release the handle
    ///
    /// Idempotent: the first call destroys the native object iff owning;
    /// every later call is a no-op. Safe to call concurrently from the
    /// explicit disposal path and the deferred finalizer path.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.owns.load(Ordering::Acquire) {
            tracing::debug!(id = %self.id, "destroying native object");
            self.native.destroy(self.id);
        } else {
            tracing::trace!(id = %self.id, "releasing borrowed handle, native object untouched");
        }
    }

    /// Mark the handle released without touching native state
    ///
    /// Used by the finalizer path when a wrapper is dropped off the
    /// UI-affined thread: the same atomic flag as [`NativeHandle::release`]
    /// is set, so the two paths cannot double-free, and actual destruction
    /// is handed to the deferred queue as plain data.
    ///
    /// Returns `None` when already released, otherwise `Some(owns)` telling
    /// the caller whether a deferred destroy is required.
    pub(crate) fn mark_released_for_deferral(&self) -> Option<bool> {
        if self.released.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.owns.load(Ordering::Acquire))
    }

    /// The native interface this handle was acquired from
    pub(crate) fn native(&self) -> &Arc<dyn NativeInterface> {
        &self.native
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("id", &self.id)
            .field("owns", &self.owns())
            .field("released", &self.is_released())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
