//! # Error Handling
//!
//! This module provides the error types for the Tether runtime.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Runtime Lifecycle                                                  │
//! │  │   ├── NotInitialized       - Runtime not initialized                 │
//! │  │   └── AlreadyInitialized   - Runtime already initialized             │
//! │  │                                                                      │
//! │  ├── Handle Errors                                                      │
//! │  │   ├── InvalidHandle        - Null or unknown native reference        │
//! │  │   ├── UseAfterRelease      - Operation on a released handle          │
//! │  │   └── DuplicateOwner       - Second owning wrapper over one id       │
//! │  │                                                                      │
//! │  ├── Signal Errors                                                      │
//! │  │   └── SignalRegistration   - Native layer refused the trampoline     │
//! │  │                                                                      │
//! │  ├── Threading Errors                                                   │
//! │  │   └── WrongThread          - Mutation off the UI-affined context     │
//! │  │                                                                      │
//! │  ├── Native Service Errors                                              │
//! │  │   └── NativeCall           - Call/return operation failed natively   │
//! │  │                                                                      │
//! │  └── Internal Errors                                                    │
//! │      └── Internal             - Invariant violation (should not happen) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//!
//! Construction and disposal errors surface synchronously to the caller.
//! Invariant violations detected inside a native callback (for example a
//! dispatch arriving for a signal with zero subscribers) are logged and
//! dropped; an error must never unwind back across the native boundary.

use thiserror::Error;

use crate::native::RawId;

/// Result type alias for Tether runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Tether runtime
///
/// All errors are categorized by module/domain to make error handling
/// clearer and to provide meaningful error messages to embedders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Runtime Lifecycle Errors (100-199)
    // ========================================================================

    /// Runtime has not been initialized
    #[error("Tether runtime has not been initialized. Call Runtime::initialize() first.")]
    NotInitialized,

    /// Runtime has already been initialized
    #[error("Tether runtime has already been initialized.")]
    AlreadyInitialized,

    // ========================================================================
    // Handle Errors (200-299)
    // ========================================================================

    /// Construction was attempted from a null or unknown native reference
    #[error("Invalid native handle: {0}")]
    InvalidHandle(RawId),

    /// An operation was attempted after the handle was released
    #[error("Use after release of native handle {0}")]
    UseAfterRelease(RawId),

    /// A second owning wrapper was attached over a native id that already
    /// has a live owner
    #[error("Native handle {0} already has an owning wrapper")]
    DuplicateOwner(RawId),

    // ========================================================================
    // Signal Errors (300-399)
    // ========================================================================

    /// The native layer refused to register the signal trampoline, typically
    /// because the resource is already released or the service is not
    /// supported on this device
    #[error("Native layer refused registration for signal '{signal}': {reason}")]
    SignalRegistration {
        /// Signal name the registration was attempted for
        signal: String,
        /// Reason reported by the native layer
        reason: String,
    },

    // ========================================================================
    // Threading Errors (400-499)
    // ========================================================================

    /// Disposal or mutation was attempted off the UI-affined context
    #[error("Operation attempted from a thread other than the UI-affined context")]
    WrongThread,

    // ========================================================================
    // Native Service Errors (500-599)
    // ========================================================================

    /// The native layer reported a failure for a call/return operation
    #[error("Native call '{method}' failed: {reason}")]
    NativeCall {
        /// Method name passed across the seam
        method: String,
        /// Failure reason reported by the native layer
        reason: String,
    },

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Runtime lifecycle
    /// - 200-299: Handles
    /// - 300-399: Signals
    /// - 400-499: Threading
    /// - 500-599: Native service
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Lifecycle (100-199)
            Error::NotInitialized => 100,
            Error::AlreadyInitialized => 101,

            // Handles (200-299)
            Error::InvalidHandle(_) => 200,
            Error::UseAfterRelease(_) => 201,
            Error::DuplicateOwner(_) => 202,

            // Signals (300-399)
            Error::SignalRegistration { .. } => 300,

            // Threading (400-499)
            Error::WrongThread => 400,

            // Native service (500-599)
            Error::NativeCall { .. } => 500,

            // Internal (900-999)
            Error::Internal(_) => 900,
        }
    }

    /// Check if this error indicates a caller bug rather than an
    /// environmental condition
    ///
    /// Caller bugs (use-after-release, wrong-thread mutation, duplicate
    /// ownership) should be fixed in the embedding code; they are never
    /// resolved by retrying.
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Error::UseAfterRelease(_) | Error::WrongThread | Error::DuplicateOwner(_)
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
