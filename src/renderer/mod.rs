//! Composition: draws the visible layers in z-order onto a [`RasterSurface`],
//! tracks the zoom/pan view and encodes exports.

use egui::Vec2;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::error::{EditorError, Result};
use crate::event::{EventBus, ViewEvent};
use crate::layer::Layer;

mod raster;

pub use raster::{CpuSurface, RasterSurface};

pub const DEFAULT_EXPORT_QUALITY: f32 = 0.92;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::WebP => "webp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::WebP => "image/webp",
        }
    }

    /// Accepts a format name, an extension or a MIME type.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        match name.strip_prefix("image/").unwrap_or(&name) {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::WebP),
            _ => None,
        }
    }

    /// Only JPEG is encoded lossily here.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ExportFormat::Jpeg)
    }
}

/// Zoom limits and step used by the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.1,
            max: 10.0,
            step: 1.2,
        }
    }
}

#[derive(Debug)]
pub struct Compositor<S = CpuSurface> {
    surface: S,
    zoom: f32,
    pan: Vec2,
    viewport: Vec2,
    limits: ZoomLimits,
    render_count: u64,
    events: EventBus<ViewEvent>,
}

impl<S: RasterSurface> Compositor<S> {
    pub fn new(surface: S, limits: ZoomLimits) -> Self {
        let (width, height) = surface.size();
        Self {
            surface,
            zoom: 1.0,
            pan: Vec2::ZERO,
            viewport: Vec2::new(width as f32, height as f32),
            limits,
            render_count: 0,
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus<ViewEvent> {
        &self.events
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        if self.surface.size() != (width, height) {
            self.surface.resize(width, height);
        }
    }

    /// Number of completed paints.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Repaint the surface from scratch with the visible layers, bottom first.
    pub fn render<'a>(&mut self, layers: impl IntoIterator<Item = &'a Layer>) {
        self.surface.clear();
        for layer in layers.into_iter().filter(|layer| layer.visible) {
            self.surface.draw_layer(layer);
        }
        self.render_count += 1;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport = size;
    }

    /// Clamped to the zoom limits. Emits only when the zoom actually changes.
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = zoom.clamp(self.limits.min, self.limits.max);
        if zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        self.events.emit(&ViewEvent::ZoomChanged { zoom });
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * self.limits.step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / self.limits.step);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
        self.set_pan(Vec2::ZERO);
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        if pan == self.pan {
            return;
        }
        self.pan = pan;
        self.events.emit(&ViewEvent::PanChanged { pan });
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.set_pan(self.pan + delta);
    }

    /// Zoom so the whole canvas fits the viewport, centered.
    pub fn fit_to_screen(&mut self) {
        let (width, height) = self.surface.size();
        if width == 0 || height == 0 || self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return;
        }
        let canvas = Vec2::new(width as f32, height as f32);
        let zoom = (self.viewport.x / canvas.x).min(self.viewport.y / canvas.y);
        self.set_zoom(zoom);
        self.set_pan((self.viewport - canvas * self.zoom) / 2.0);
    }

    /// Encode the current surface. `quality` in `[0, 1]` applies to lossy
    /// formats only.
    pub fn export(&self, format: ExportFormat, quality: f32) -> Result<Vec<u8>> {
        let pixels = self.surface.pixels();
        let (width, height) = pixels.dimensions();
        let mut bytes = Vec::new();

        let encoded = match format {
            ExportFormat::Png => PngEncoder::new(&mut bytes).write_image(
                pixels.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            ExportFormat::Jpeg => {
                let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
                let rgb = DynamicImage::ImageRgba8(pixels).to_rgb8();
                JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            ExportFormat::WebP => WebPEncoder::new_lossless(&mut bytes).write_image(
                pixels.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
        };
        encoded.map_err(|source| EditorError::Export {
            format: format.as_str(),
            source,
        })?;

        log::info!("Exported {}x{} {} ({} bytes)", width, height, format.as_str(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::layer::{ImageContent, LayerContent};
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn compositor(width: u32, height: u32) -> Compositor {
        Compositor::new(CpuSurface::new(width, height), ZoomLimits::default())
    }

    fn solid_layer(color: [u8; 4]) -> Layer {
        let pixels = RgbaImage::from_pixel(2, 2, Rgba(color));
        Layer::new("solid", LayerContent::Image(ImageContent::new(Bitmap::new(pixels))))
    }

    #[test]
    fn hidden_layers_are_skipped() {
        let mut compositor = compositor(2, 2);
        let bottom = solid_layer([255, 0, 0, 255]);
        let mut top = solid_layer([0, 0, 255, 255]);
        top.visible = false;

        compositor.render([&bottom, &top]);
        assert_eq!(compositor.surface().target().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(compositor.render_count(), 1);
    }

    #[test]
    fn zoom_is_clamped_and_reported_once() {
        let mut compositor = compositor(10, 10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        compositor
            .events()
            .subscribe(move |event: &ViewEvent| sink.borrow_mut().push(*event));

        compositor.set_zoom(100.0);
        compositor.set_zoom(50.0);
        assert_eq!(compositor.zoom(), 10.0);
        assert_eq!(*seen.borrow(), vec![ViewEvent::ZoomChanged { zoom: 10.0 }]);

        compositor.reset_zoom();
        compositor.zoom_out();
        assert!((compositor.zoom() - 1.0 / 1.2).abs() < 1e-6);
    }

    #[test]
    fn fit_to_screen_centers_canvas() {
        let mut compositor = compositor(200, 100);
        compositor.set_viewport_size(Vec2::new(100.0, 100.0));
        compositor.fit_to_screen();
        assert_eq!(compositor.zoom(), 0.5);
        assert_eq!(compositor.pan(), Vec2::new(0.0, 25.0));
    }

    #[test]
    fn exports_decode_back() {
        let mut compositor = compositor(3, 2);
        compositor.render([&solid_layer([10, 200, 30, 255])]);

        for format in [ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::WebP] {
            let bytes = compositor.export(format, DEFAULT_EXPORT_QUALITY).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (3, 2), "{}", format.as_str());
        }
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::parse("image/jpeg"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::parse("JPG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::parse("gif"), None);
        assert!(!ExportFormat::WebP.is_lossy());
    }
}
