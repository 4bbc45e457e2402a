use crate::hints::SamplingHints;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn splat(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub const fn components(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Periodic term for one color channel: wave counts across the texture and
/// phase offsets, both per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelWave {
    pub period: Vec2,
    pub phase: Vec2,
}

impl ChannelWave {
    pub const fn new(period: Vec2, phase: Vec2) -> Self {
        Self { period, phase }
    }
}

/// The full plasma function: a wave per channel plus the affine color
/// transform applied to every channel's intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlasmaFunction {
    pub color_amp: ColorRgba,
    pub color_offset: ColorRgba,
    pub red: ChannelWave,
    pub green: ChannelWave,
    pub blue: ChannelWave,
    pub alpha: ChannelWave,
}

impl PlasmaFunction {
    /// Channels in their canonical order. Key derivation and the generator
    /// kernel both iterate in this order.
    pub const fn channels(&self) -> [ChannelWave; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

impl Default for PlasmaFunction {
    fn default() -> Self {
        let unit_period = ChannelWave::new(Vec2::new(1.0, 1.0), Vec2::default());
        Self {
            color_amp: ColorRgba::splat(1.0),
            color_offset: ColorRgba::default(),
            red: unit_period,
            green: unit_period,
            blue: ChannelWave::default(),
            alpha: ChannelWave::default(),
        }
    }
}

/// Power-of-two edge lengths a node may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSize {
    Edge8,
    Edge16,
    Edge32,
    Edge64,
    Edge128,
    Edge256,
    Edge512,
    Edge1024,
}

impl TextureSize {
    pub const ALL: [TextureSize; 8] = [
        TextureSize::Edge8,
        TextureSize::Edge16,
        TextureSize::Edge32,
        TextureSize::Edge64,
        TextureSize::Edge128,
        TextureSize::Edge256,
        TextureSize::Edge512,
        TextureSize::Edge1024,
    ];

    pub const fn edge(self) -> u32 {
        8 << self.option_index()
    }

    pub const fn option_index(self) -> u32 {
        match self {
            TextureSize::Edge8 => 0,
            TextureSize::Edge16 => 1,
            TextureSize::Edge32 => 2,
            TextureSize::Edge64 => 3,
            TextureSize::Edge128 => 4,
            TextureSize::Edge256 => 5,
            TextureSize::Edge512 => 6,
            TextureSize::Edge1024 => 7,
        }
    }

    pub fn from_option_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Edge128
    }
}

/// Everything the node reads from its inputs on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationParams {
    pub function: PlasmaFunction,
    pub size: TextureSize,
    pub hints: SamplingHints,
}
