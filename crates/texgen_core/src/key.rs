use crate::params::{GenerationParams, TextureSize};

/// Four channels of (period.x, period.y, phase.x, phase.y) plus the color
/// amplitude and color offset vectors.
const KEY_COMPONENTS: usize = 4 * 4 + 4 + 4;

/// Cache identity of one generated texture.
///
/// The key stores the canonical bit pattern of every generation input
/// rather than a digest of them, so value-equal parameter sets always map
/// onto the same key and value-distinct sets can never collide. Sampling
/// hints are excluded: they do not change texel content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    size: TextureSize,
    bits: [u32; KEY_COMPONENTS],
}

impl CacheKey {
    pub fn derive(params: &GenerationParams) -> Self {
        let mut bits = [0u32; KEY_COMPONENTS];
        let mut cursor = 0;
        let mut push = |value: f32| {
            bits[cursor] = canonical_bits(value);
            cursor += 1;
        };

        // Channel-major, R,G,B,A, period before phase. The generator kernel
        // consumes the channels in the same order.
        for wave in params.function.channels() {
            push(wave.period.x);
            push(wave.period.y);
            push(wave.phase.x);
            push(wave.phase.y);
        }
        for component in params.function.color_amp.components() {
            push(component);
        }
        for component in params.function.color_offset.components() {
            push(component);
        }

        Self {
            size: params.size,
            bits,
        }
    }

    pub const fn size(&self) -> TextureSize {
        self.size
    }
}

/// Negative zero folds onto zero so value-equal inputs share a key.
fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 { 0 } else { value.to_bits() }
}
