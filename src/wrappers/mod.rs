//! # Concrete Wrappers
//!
//! Typed applications of the handle/bridge pattern over specific native
//! services. Each wrapper composes a [`Proxy`](crate::proxy::Proxy) and
//! adds capability methods; none of them contains logic beyond converting
//! payloads and forwarding calls; the behavior lives in the native service.
//!
//! - [`wifi`] - Wi-Fi device manager (activation, scanning, state signals)
//! - [`input_method`] - input-method context, including the response-bearing
//!   commit callback
//! - [`list_item`] - borrowed widget-item views
//! - [`metadata`] - media metadata snapshots copied out of native handles

pub mod input_method;
pub mod list_item;
pub mod metadata;
pub mod wifi;
