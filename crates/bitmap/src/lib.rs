use std::fmt;

pub mod generators;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapAllocError {
    /// The texel count overflowed or the allocator refused the request.
    /// Resource exhaustion is reported, not aborted on, so a caller can
    /// mark the generation failed and keep running.
    OutOfMemory { width: u32, height: u32 },
}

impl fmt::Display for BitmapAllocError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitmapAllocError::OutOfMemory { width, height } => {
                write!(formatter, "bitmap allocation of {width}x{height} texels failed")
            }
        }
    }
}

impl std::error::Error for BitmapAllocError {}

/// CPU-side RGBA8 pixel buffer, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    texels: Box<[Rgba8]>,
}

impl Bitmap {
    pub fn try_with_size(width: u32, height: u32) -> Result<Self, BitmapAllocError> {
        let texel_count = (width as usize)
            .checked_mul(height as usize)
            .ok_or(BitmapAllocError::OutOfMemory { width, height })?;
        let mut texels = Vec::new();
        texels
            .try_reserve_exact(texel_count)
            .map_err(|_| BitmapAllocError::OutOfMemory { width, height })?;
        texels.resize(texel_count, Rgba8::new(0, 0, 0, 0));
        Ok(Self {
            width,
            height,
            texels: texels.into_boxed_slice(),
        })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn texel(&self, x: u32, y: u32) -> Rgba8 {
        assert!(x < self.width && y < self.height, "texel out of bounds");
        self.texels[y as usize * self.width as usize + x as usize]
    }

    pub fn texels(&self) -> &[Rgba8] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Rgba8] {
        &mut self.texels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * std::mem::size_of::<Rgba8>() as u32
    }
}
