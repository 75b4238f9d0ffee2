use image::RgbaImage;
use rand::Rng;

use super::convolution::{blur_radius, box_blur, convolve, sharpen_kernel};
use super::{clamp_channel, luma, FilterEngine};

/// Peak-to-peak jitter of `noise` and `grain` at value 1.0.
const NOISE_AMPLITUDE: f32 = 100.0;

/// Channel shift of `temperature` and `tint` at value 1.0.
const COLOR_SHIFT: f32 = 30.0;

pub(super) fn register_all(engine: &mut FilterEngine) {
    engine.register_filter("brightness", brightness);
    engine.register_filter("contrast", contrast);
    engine.register_filter("saturation", saturation);
    engine.register_filter("hue", hue);
    engine.register_filter("exposure", exposure);
    engine.register_filter("temperature", temperature);
    engine.register_filter("tint", tint);
    engine.register_filter("vibrance", vibrance);
    engine.register_filter("sharpen", |pixels, v| convolve(pixels, &sharpen_kernel(v)));
    engine.register_filter("blur", |pixels, v| box_blur(pixels, blur_radius(v)));
    engine.register_filter("grayscale", grayscale);
    engine.register_filter("sepia", sepia);
    engine.register_filter("invert", invert);
    engine.register_filter("vignette", vignette);
    engine.register_filter("noise", noise);
    engine.register_filter("grain", grain);
}

/// Rebuild the image from a per-pixel RGB function; alpha is copied through.
fn map_rgb(pixels: &RgbaImage, mut f: impl FnMut(u32, u32, [f32; 3]) -> [f32; 3]) -> RgbaImage {
    let mut out = pixels.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let rgb = [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])];
        let [r, g, b] = f(x, y, rgb);
        px[0] = clamp_channel(r);
        px[1] = clamp_channel(g);
        px[2] = clamp_channel(b);
    }
    out
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

pub(super) fn brightness(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let delta = v * 255.0;
    map_rgb(pixels, |_, _, [r, g, b]| [r + delta, g + delta, b + delta])
}

pub(super) fn contrast(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let c = v * 255.0;
    let factor = (259.0 * (c + 255.0)) / (255.0 * (259.0 - c));
    let adjust = |ch: f32| factor * (ch - 128.0) + 128.0;
    map_rgb(pixels, |_, _, [r, g, b]| [adjust(r), adjust(g), adjust(b)])
}

pub(super) fn saturation(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let factor = v + 1.0;
    map_rgb(pixels, |_, _, [r, g, b]| {
        let gray = luma(r, g, b);
        [
            gray + (r - gray) * factor,
            gray + (g - gray) * factor,
            gray + (b - gray) * factor,
        ]
    })
}

pub(super) fn hue(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let (sin, cos) = (v * 360.0).to_radians().sin_cos();
    let m = [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ];
    map_rgb(pixels, |_, _, [r, g, b]| {
        [
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
        ]
    })
}

pub(super) fn exposure(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let factor = 2f32.powf(v);
    map_rgb(pixels, |_, _, [r, g, b]| [r * factor, g * factor, b * factor])
}

pub(super) fn temperature(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let shift = v * COLOR_SHIFT;
    map_rgb(pixels, |_, _, [r, g, b]| [r + shift, g, b - shift])
}

pub(super) fn tint(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let shift = v * COLOR_SHIFT;
    map_rgb(pixels, |_, _, [r, g, b]| [r, g + shift, b])
}

/// Pulls the weaker channels away from (positive `v`) or toward (negative
/// `v`) the strongest one, scaled by how far the pixel already is from gray.
pub(super) fn vibrance(pixels: &RgbaImage, v: f32) -> RgbaImage {
    map_rgb(pixels, |_, _, [r, g, b]| {
        let max = r.max(g).max(b);
        let avg = (r + g + b) / 3.0;
        let amount = ((max - avg).abs() * 2.0 / 255.0) * -v;
        let adjust = |ch: f32| if ch == max { ch } else { ch + (max - ch) * amount };
        [adjust(r), adjust(g), adjust(b)]
    })
}

pub(super) fn grayscale(pixels: &RgbaImage, v: f32) -> RgbaImage {
    map_rgb(pixels, |_, _, [r, g, b]| {
        let gray = luma(r, g, b);
        [lerp(r, gray, v), lerp(g, gray, v), lerp(b, gray, v)]
    })
}

pub(super) fn sepia(pixels: &RgbaImage, v: f32) -> RgbaImage {
    map_rgb(pixels, |_, _, [r, g, b]| {
        let sr = 0.393 * r + 0.769 * g + 0.189 * b;
        let sg = 0.349 * r + 0.686 * g + 0.168 * b;
        let sb = 0.272 * r + 0.534 * g + 0.131 * b;
        [lerp(r, sr, v), lerp(g, sg, v), lerp(b, sb, v)]
    })
}

pub(super) fn invert(pixels: &RgbaImage, v: f32) -> RgbaImage {
    map_rgb(pixels, |_, _, [r, g, b]| {
        [
            lerp(r, 255.0 - r, v),
            lerp(g, 255.0 - g, v),
            lerp(b, 255.0 - b, v),
        ]
    })
}

pub(super) fn vignette(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let cx = pixels.width() as f32 / 2.0;
    let cy = pixels.height() as f32 / 2.0;
    let max_distance = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);
    map_rgb(pixels, |x, y, [r, g, b]| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let distance = (dx * dx + dy * dy).sqrt() / max_distance;
        let factor = 1.0 - distance * v;
        [r * factor, g * factor, b * factor]
    })
}

pub(super) fn noise(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let mut rng = rand::thread_rng();
    map_rgb(pixels, |_, _, [r, g, b]| {
        let jitter = (rng.gen_range(0.0..1.0f32) - 0.5) * v * NOISE_AMPLITUDE;
        [r + jitter, g + jitter, b + jitter]
    })
}

/// Like [`noise`], but shadows receive more jitter than highlights.
pub(super) fn grain(pixels: &RgbaImage, v: f32) -> RgbaImage {
    let mut rng = rand::thread_rng();
    map_rgb(pixels, |_, _, [r, g, b]| {
        let weight = 1.0 - luma(r, g, b) / 255.0;
        let jitter = (rng.gen_range(0.0..1.0f32) - 0.5) * v * NOISE_AMPLITUDE * weight;
        [r + jitter, g + jitter, b + jitter]
    })
}
