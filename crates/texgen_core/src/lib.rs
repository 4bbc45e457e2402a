mod hints;
mod key;
mod params;
mod port;

pub use hints::SamplingHints;
pub use key::CacheKey;
pub use params::{
    ChannelWave, ColorRgba, GenerationParams, PlasmaFunction, TextureSize, Vec2,
};
pub use port::OutputPort;

/// Identifies one allocated texture inside a backend. Minted by the backend
/// on allocation; opaque everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}
