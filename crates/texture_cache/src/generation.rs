//! Generation task body: runs on a worker thread, fills one cache entry,
//! and flips its readiness flag as the very last visible action.

use std::fmt;
use std::sync::Arc;

use bitmap::generators::plasma;
use bitmap::{Bitmap, BitmapAllocError};
use texgen_core::GenerationParams;

use crate::backend::{TextureAllocDesc, TextureAllocError, TextureBackend};
use crate::cache::{CacheShared, TextureHandle, TexturePayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    Bitmap(BitmapAllocError),
    Texture(TextureAllocError),
}

impl From<BitmapAllocError> for GenerationError {
    fn from(error: BitmapAllocError) -> Self {
        GenerationError::Bitmap(error)
    }
}

impl From<TextureAllocError> for GenerationError {
    fn from(error: TextureAllocError) -> Self {
        GenerationError::Texture(error)
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Bitmap(error) => write!(formatter, "{error}"),
            GenerationError::Texture(error) => write!(formatter, "{error}"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Fill the entry behind `task_ref`, then release the task's reference.
///
/// Success path ordering: texels and GPU upload first, payload publication
/// second, readiness flag last. Any failure marks the entry failed instead
/// of ready; the entry never becomes ready partially written.
pub(crate) fn run(cache: &CacheShared, task_ref: TextureHandle, params: GenerationParams) {
    match generate_payload(cache.backend(), &params) {
        Ok(payload) => {
            let slot = task_ref.slot();
            if slot.payload.set(payload).is_err() {
                panic!("internal invariant violated: payload published twice");
            }
            slot.mark_ready();
            if crate::trace_enabled() {
                eprintln!("[texture_cache] generation for {:?} ready", slot.key);
            }
        }
        Err(error) => {
            eprintln!(
                "[texture_cache] generation for {:?} failed: {error}",
                task_ref.key()
            );
            task_ref.slot().mark_failed();
        }
    }
    cache.release(task_ref);
}

fn generate_payload(
    backend: &Arc<dyn TextureBackend>,
    params: &GenerationParams,
) -> Result<TexturePayload, GenerationError> {
    let edge = params.size.edge();
    let mut target = Bitmap::try_with_size(edge, edge)?;
    plasma::generate(&mut target, &params.function);
    let texture = backend.alloc(TextureAllocDesc {
        width: edge,
        height: edge,
    })?;
    backend.upload(texture, &target);
    Ok(TexturePayload {
        texture,
        width: edge,
        height: edge,
        bitmap: target,
    })
}
