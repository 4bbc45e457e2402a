use std::fmt;

use bitmap::Bitmap;
use texgen_core::TextureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureAllocDesc {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureAllocError {
    /// The backend could not provide the storage (out of device memory,
    /// over a device limit, or an injected test failure).
    Exhausted { width: u32, height: u32 },
    /// The backend's validation layer rejected the allocation.
    Rejected { message: String },
}

impl fmt::Display for TextureAllocError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureAllocError::Exhausted { width, height } => {
                write!(
                    formatter,
                    "texture allocation of {width}x{height} exhausted backend storage"
                )
            }
            TextureAllocError::Rejected { message } => {
                write!(formatter, "texture allocation rejected: {message}")
            }
        }
    }
}

impl std::error::Error for TextureAllocError {}

/// The GPU side of a cache entry: allocate on generation, upload once,
/// destroy exactly when the entry's reference count reaches zero. Called
/// from worker threads and from whichever thread releases last, so
/// implementations must be fully thread-safe.
pub trait TextureBackend: Send + Sync {
    fn alloc(&self, desc: TextureAllocDesc) -> Result<TextureId, TextureAllocError>;

    /// Fill a previously allocated texture. The bitmap dimensions always
    /// match the allocation's.
    fn upload(&self, texture: TextureId, bitmap: &Bitmap);

    fn destroy(&self, texture: TextureId);
}
