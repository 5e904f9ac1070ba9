//! Marker traits that keep bridge bounds aligned with the threading model of
//! each target.
//!
//! Native hosts share bridge implementations across async tasks and need
//! `Send + Sync`. Browser hosts run on one thread and hand out objects that
//! are neither.

/// `Send + Sync` on native targets, a no-op on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}
