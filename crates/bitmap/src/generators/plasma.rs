//! Sin-plasma texel generator.
//!
//! Pure and reentrant: output depends only on the target dimensions and the
//! supplied function, and nothing outside the target buffer is touched, so
//! any number of generations may run concurrently on different buffers.

use std::f32::consts::TAU;

use texgen_core::{ChannelWave, PlasmaFunction};

use crate::{Bitmap, Rgba8};

/// Fill `target` with the plasma pattern described by `function`.
///
/// Each axis spans one period of `TAU` across the full edge, so a period
/// component of `n` produces `n` full waves and the pattern tiles
/// seamlessly. Channel intensity is
/// `0.5 + 0.5 * sin(x' * period.x + phase.x * TAU) * cos(y' * period.y + phase.y * TAU)`,
/// then scaled by the color amplitude, shifted by the color offset, and
/// clamped to [0, 1] before 8-bit quantization.
pub fn generate(target: &mut Bitmap, function: &PlasmaFunction) {
    let width = target.width();
    let height = target.height();
    if width == 0 || height == 0 {
        return;
    }

    let x_step = TAU / width as f32;
    let y_step = TAU / height as f32;
    let channels = function.channels();
    let amps = function.color_amp.components();
    let offsets = function.color_offset.components();

    let texels = target.texels_mut();
    for y in 0..height {
        let yf = y as f32 * y_step;
        for x in 0..width {
            let xf = x as f32 * x_step;
            let mut quantized = [0u8; 4];
            for (slot, ((wave, amp), offset)) in quantized
                .iter_mut()
                .zip(channels.iter().zip(amps).zip(offsets))
            {
                let intensity = channel_intensity(wave, xf, yf);
                *slot = quantize(amp * intensity + offset);
            }
            texels[y as usize * width as usize + x as usize] = Rgba8::new(
                quantized[0],
                quantized[1],
                quantized[2],
                quantized[3],
            );
        }
    }
}

fn channel_intensity(wave: &ChannelWave, x: f32, y: f32) -> f32 {
    let horizontal = (x * wave.period.x + wave.phase.x * TAU).sin();
    let vertical = (y * wave.period.y + wave.phase.y * TAU).cos();
    0.5 + 0.5 * horizontal * vertical
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}
