//! wgpu implementation of the texture backend.
//!
//! Owns nothing but textures: the device and queue are injected by whoever
//! manages the GPU context. Thread-safe throughout, since allocation and
//! upload arrive from generation workers while destruction arrives from
//! whichever thread drops the last cache reference.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bitmap::Bitmap;
use texgen_core::{SamplingHints, TextureId};
use texture_cache::{TextureAllocDesc, TextureAllocError, TextureBackend};

pub struct WgpuTextureBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: AtomicU64,
    textures: Mutex<HashMap<TextureId, TextureEntry>>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuTextureBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: AtomicU64::new(1),
            textures: Mutex::new(HashMap::new()),
        }
    }

    /// View for a downstream bind group. None once the texture has been
    /// destroyed; a correctly sequenced consumer never observes that.
    pub fn view(&self, texture: TextureId) -> Option<wgpu::TextureView> {
        self.textures
            .lock()
            .expect("texture table poisoned")
            .get(&texture)
            .map(|entry| entry.view.clone())
    }

    /// Sampler matching a published ref's hints. Samplers are cheap and
    /// internally deduplicated by wgpu; one per bind is fine.
    pub fn sampler_for(&self, hints: SamplingHints) -> wgpu::Sampler {
        self.device.create_sampler(&sampler_descriptor(hints))
    }
}

impl TextureBackend for WgpuTextureBackend {
    fn alloc(&self, desc: TextureAllocDesc) -> Result<TextureId, TextureAllocError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(TextureAllocError::Rejected {
                message: format!(
                    "{}x{} exceeds max_texture_dimension_2d {limit}",
                    desc.width, desc.height
                ),
            });
        }

        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gpu_runtime.generated_texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(TextureAllocError::Rejected {
                message: error.to_string(),
            });
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.textures
            .lock()
            .expect("texture table poisoned")
            .insert(id, TextureEntry { texture, view });
        Ok(id)
    }

    fn upload(&self, texture: TextureId, bitmap: &Bitmap) {
        let textures = self.textures.lock().expect("texture table poisoned");
        let Some(entry) = textures.get(&texture) else {
            eprintln!("[gpu_runtime] upload to unknown texture {texture:?}");
            return;
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bitmap.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.bytes_per_row()),
                rows_per_image: Some(bitmap.height()),
            },
            wgpu::Extent3d {
                width: bitmap.width(),
                height: bitmap.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy(&self, texture: TextureId) {
        let entry = self
            .textures
            .lock()
            .expect("texture table poisoned")
            .remove(&texture);
        match entry {
            Some(entry) => entry.texture.destroy(),
            None => eprintln!("[gpu_runtime] destroy of unknown texture {texture:?}"),
        }
    }
}

fn sampler_descriptor(hints: SamplingHints) -> wgpu::SamplerDescriptor<'static> {
    let filter = if hints.contains(SamplingHints::LINEAR_FILTER) {
        wgpu::FilterMode::Linear
    } else {
        wgpu::FilterMode::Nearest
    };
    let mipmap_filter = if hints.contains(SamplingHints::MIPMAP_LINEAR) {
        wgpu::MipmapFilterMode::Linear
    } else {
        wgpu::MipmapFilterMode::Nearest
    };
    // wgpu validation requires every filter to be linear before anisotropy
    // may exceed one.
    let anisotropic = hints.contains(SamplingHints::ANISOTROPIC)
        && hints.contains(SamplingHints::LINEAR_FILTER)
        && hints.contains(SamplingHints::MIPMAP_LINEAR);
    wgpu::SamplerDescriptor {
        label: Some("gpu_runtime.generated_texture_sampler"),
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        anisotropy_clamp: if anisotropic { 16 } else { 1 },
        ..Default::default()
    }
}
