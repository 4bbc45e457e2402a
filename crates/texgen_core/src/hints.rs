bitflags::bitflags! {
    /// Sampling configuration requested alongside a texture. Hints never
    /// participate in cache identity: they select how a consumer samples
    /// the texture, not what its texels contain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SamplingHints: u8 {
        const LINEAR_FILTER = 1 << 0;
        const ANISOTROPIC = 1 << 1;
        const MIPMAPS = 1 << 2;
        const MIPMAP_LINEAR = 1 << 3;
    }
}

impl Default for SamplingHints {
    fn default() -> Self {
        SamplingHints::LINEAR_FILTER | SamplingHints::MIPMAP_LINEAR
    }
}
