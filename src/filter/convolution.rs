use image::{Rgba, RgbaImage};

use super::clamp_channel;

/// A square convolution kernel with an odd side length.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Returns `None` unless `size` is odd and `weights` has `size * size` entries.
    pub fn new(size: usize, weights: Vec<f32>) -> Option<Self> {
        (size % 2 == 1 && weights.len() == size * size).then_some(Self { size, weights })
    }

    pub fn identity() -> Self {
        Self {
            size: 1,
            weights: vec![1.0],
        }
    }

    /// A uniform averaging kernel.
    pub fn box_blur(size: usize) -> Self {
        let size = size.max(1) | 1;
        let weight = 1.0 / (size * size) as f32;
        Self {
            size,
            weights: vec![weight; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn is_identity(&self) -> bool {
        self.size == 1 && self.weights[0] == 1.0
    }
}

/// `[0, -v, 0; -v, 1 + 4v, -v; 0, -v, 0]`
pub fn sharpen_kernel(v: f32) -> Kernel {
    Kernel {
        size: 3,
        weights: vec![0.0, -v, 0.0, -v, 1.0 + 4.0 * v, -v, 0.0, -v, 0.0],
    }
}

/// Blur radius in pixels: one pixel per 0.1 of `v`.
pub fn blur_radius(v: f32) -> usize {
    (v.max(0.0) * 10.0).ceil() as usize
}

/// Box kernel of [`blur_radius`]; [`box_blur`] computes the same result faster.
pub fn blur_kernel(v: f32) -> Kernel {
    let radius = blur_radius(v);
    if radius == 0 {
        return Kernel::identity();
    }
    Kernel::box_blur(radius * 2 + 1)
}

/// Box blur as a horizontal pass followed by a vertical pass, with the same
/// edge clamping as [`convolve`]. Alpha is copied from the source.
pub fn box_blur(pixels: &RgbaImage, radius: usize) -> RgbaImage {
    if radius == 0 || pixels.width() == 0 || pixels.height() == 0 {
        return pixels.clone();
    }

    let (width, height) = pixels.dimensions();
    let (w, h) = (width as usize, height as usize);
    let r = radius as i64;
    let scale = 1.0 / (2 * radius + 1) as f32;

    let mut rows = vec![[0.0f32; 3]; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for dx in -r..=r {
                let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let px = pixels.get_pixel(sx, y as u32);
                for (channel, sum) in acc.iter_mut().enumerate() {
                    *sum += f32::from(px[channel]);
                }
            }
            rows[y * w + x] = acc.map(|sum| sum * scale);
        }
    }

    RgbaImage::from_fn(width, height, |x, y| {
        let mut acc = [0.0f32; 3];
        for dy in -r..=r {
            let sy = (i64::from(y) + dy).clamp(0, h as i64 - 1) as usize;
            let row = rows[sy * w + x as usize];
            for (sum, value) in acc.iter_mut().zip(row) {
                *sum += value;
            }
        }
        let alpha = pixels.get_pixel(x, y)[3];
        Rgba([
            clamp_channel(acc[0] * scale),
            clamp_channel(acc[1] * scale),
            clamp_channel(acc[2] * scale),
            alpha,
        ])
    })
}

/// Convolve the RGB channels, sampling out-of-bounds pixels from the nearest
/// edge. Alpha is copied from the source.
pub fn convolve(pixels: &RgbaImage, kernel: &Kernel) -> RgbaImage {
    if kernel.is_identity() || pixels.width() == 0 || pixels.height() == 0 {
        return pixels.clone();
    }

    let (width, height) = pixels.dimensions();
    let half = (kernel.size / 2) as i64;
    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;

    RgbaImage::from_fn(width, height, |x, y| {
        let mut acc = [0.0f32; 3];
        for ky in 0..kernel.size {
            let sy = (i64::from(y) + ky as i64 - half).clamp(0, max_y) as u32;
            for kx in 0..kernel.size {
                let weight = kernel.weights[ky * kernel.size + kx];
                if weight == 0.0 {
                    continue;
                }
                let sx = (i64::from(x) + kx as i64 - half).clamp(0, max_x) as u32;
                let px = pixels.get_pixel(sx, sy);
                for (channel, sum) in acc.iter_mut().enumerate() {
                    *sum += f32::from(px[channel]) * weight;
                }
            }
        }
        let alpha = pixels.get_pixel(x, y)[3];
        Rgba([
            clamp_channel(acc[0]),
            clamp_channel(acc[1]),
            clamp_channel(acc[2]),
            alpha,
        ])
    })
}
