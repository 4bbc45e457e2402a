//! Content-addressed cache for generated textures.
//!
//! One entry per distinct generation parameter set, filled exactly once by a
//! background worker, shared by reference count, and destroyed synchronously
//! the moment the last reference is released. Creation is atomic
//! check-then-insert, so concurrent requests for the same key converge on a
//! single entry and a single generation task.

mod backend;
mod cache;
mod generation;
mod worker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;

pub use backend::{TextureAllocDesc, TextureAllocError, TextureBackend};
pub use cache::{
    AcquireError, CreateError, GenerationTicket, Readiness, TextureCache, TextureHandle,
    TexturePayload,
};
pub use generation::GenerationError;
pub use worker::{WorkerPool, WorkerPoolConfig};

/// Diagnostic tracing for cache transitions, read once from the
/// environment. Invariant violations are logged regardless of this flag.
pub(crate) fn trace_enabled() -> bool {
    static TRACE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *TRACE.get_or_init(|| std::env::var_os("TEXGEN_CACHE_TRACE").is_some())
}
