use egui::{Color32, Pos2, Rect};
use image::{Rgba, RgbaImage};

use crate::bitmap::BitmapPixels;
use crate::layer::{
    apply_matrix, DrawingContent, Layer, LayerContent, ShapeContent, ShapeKind,
};

/// The drawing device the compositor renders into.
pub trait RasterSurface {
    fn size(&self) -> (u32, u32);

    /// Resize and clear.
    fn resize(&mut self, width: u32, height: u32);

    /// Reset every pixel to transparent.
    fn clear(&mut self);

    /// Draw one layer over what is already there, honoring its transform,
    /// opacity and blend mode.
    fn draw_layer(&mut self, layer: &Layer);

    /// The current contents.
    fn pixels(&self) -> RgbaImage;
}

/// A software surface backed by an [`RgbaImage`].
#[derive(Debug, Clone, Default)]
pub struct CpuSurface {
    target: RgbaImage,
}

impl CpuSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: RgbaImage::new(width, height),
        }
    }

    pub fn target(&self) -> &RgbaImage {
        &self.target
    }
}

impl RasterSurface for CpuSurface {
    fn size(&self) -> (u32, u32) {
        self.target.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.target = RgbaImage::new(width, height);
    }

    fn clear(&mut self) {
        for px in self.target.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_layer(&mut self, layer: &Layer) {
        let source = match &layer.content {
            LayerContent::Image(image) => Source::Raster(image.source.pixels()),
            LayerContent::Sticker(sticker) => Source::Raster(sticker.source.pixels()),
            LayerContent::Shape(shape) => Source::Shape(shape),
            LayerContent::Drawing(drawing) => Source::Drawing(drawing),
            LayerContent::Text(_) | LayerContent::Adjustment(_) => {
                log::debug!(
                    "No rasterizer for {} layer {}; skipping",
                    layer.layer_type().as_str(),
                    layer.id
                );
                return;
            }
        };

        let Some(inverse) = layer.transform.inverse_matrix() else {
            return;
        };
        let Some(area) = self.device_area(layer, source.bounds()) else {
            return;
        };

        let opacity = layer.opacity.clamp(0.0, 1.0);
        for y in area.min.1..area.max.1 {
            for x in area.min.0..area.max.0 {
                let (lx, ly) = apply_matrix(&inverse, x as f32 + 0.5, y as f32 + 0.5);
                let Some(color) = source.sample(Pos2::new(lx, ly)) else {
                    continue;
                };
                let dst = self.target.get_pixel_mut(x, y);
                *dst = composite(color, *dst, opacity, layer);
            }
        }
    }

    fn pixels(&self) -> RgbaImage {
        self.target.clone()
    }
}

struct PixelArea {
    min: (u32, u32),
    max: (u32, u32),
}

impl CpuSurface {
    /// The device pixels covered by `local` after the layer transform,
    /// clipped to the surface.
    fn device_area(&self, layer: &Layer, local: Rect) -> Option<PixelArea> {
        if !local.is_positive() {
            return None;
        }
        let m = layer.transform.to_matrix();
        let corners = [local.left_top(), local.right_top(), local.left_bottom(), local.right_bottom()]
            .map(|p| apply_matrix(&m, p.x, p.y));

        let (width, height) = self.target.dimensions();
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let area = PixelArea {
            min: (
                min_x.floor().clamp(0.0, width as f32) as u32,
                min_y.floor().clamp(0.0, height as f32) as u32,
            ),
            max: (
                max_x.ceil().clamp(0.0, width as f32) as u32,
                max_y.ceil().clamp(0.0, height as f32) as u32,
            ),
        };
        (area.min.0 < area.max.0 && area.min.1 < area.max.1).then_some(area)
    }
}

/// Layer content prepared for sampling in the layer's local space.
enum Source<'a> {
    Raster(BitmapPixels<'a>),
    Shape(&'a ShapeContent),
    Drawing(&'a DrawingContent),
}

impl Source<'_> {
    fn bounds(&self) -> Rect {
        match self {
            Source::Raster(pixels) => Rect::from_min_max(
                Pos2::ZERO,
                Pos2::new(pixels.width() as f32, pixels.height() as f32),
            ),
            Source::Shape(shape) => {
                let pad = shape.stroke.map_or(0.0, |s| s.width / 2.0);
                Rect::from_min_max(Pos2::ZERO, Pos2::new(shape.width, shape.height)).expand(pad)
            }
            Source::Drawing(drawing) => drawing
                .paths
                .iter()
                .map(|path| calculate_bounds(&path.points, path.width / 2.0))
                .fold(Rect::NOTHING, |acc, r| acc.union(r)),
        }
    }

    fn sample(&self, p: Pos2) -> Option<Color32> {
        match self {
            Source::Raster(pixels) => {
                if p.x < 0.0 || p.y < 0.0 {
                    return None;
                }
                let (x, y) = (p.x as u32, p.y as u32);
                if x >= pixels.width() || y >= pixels.height() {
                    return None;
                }
                let [r, g, b, a] = pixels.get_pixel(x, y).0;
                Some(Color32::from_rgba_unmultiplied(r, g, b, a))
            }
            Source::Shape(shape) => sample_shape(shape, p),
            Source::Drawing(drawing) => drawing.paths.iter().rev().find_map(|path| {
                let hit = match path.points.as_slice() {
                    [] => false,
                    [only] => (p - *only).length() <= path.width / 2.0,
                    points => points
                        .windows(2)
                        .any(|w| distance_to_line_segment(p, w[0], w[1]) <= path.width / 2.0),
                };
                hit.then_some(path.color)
            }),
        }
    }
}

fn sample_shape(shape: &ShapeContent, p: Pos2) -> Option<Color32> {
    let (w, h) = (shape.width, shape.height);
    let half_stroke = shape.stroke.map_or(0.0, |s| s.width / 2.0);

    // Distance to the outline (positive outside) for the closed shapes.
    let edge_distance = match shape.kind {
        ShapeKind::Rectangle => {
            let r = shape.corner_radius.clamp(0.0, w.min(h) / 2.0);
            let dx = (p.x - w / 2.0).abs() - (w / 2.0 - r);
            let dy = (p.y - h / 2.0).abs() - (h / 2.0 - r);
            let outside = (dx.max(0.0).powi(2) + dy.max(0.0).powi(2)).sqrt();
            outside + dx.max(dy).min(0.0) - r
        }
        ShapeKind::Ellipse => {
            let (rx, ry) = (w / 2.0, h / 2.0);
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            let nx = (p.x - rx) / rx;
            let ny = (p.y - ry) / ry;
            ((nx * nx + ny * ny).sqrt() - 1.0) * rx.min(ry)
        }
        ShapeKind::Triangle => {
            let (a, b, c) = (Pos2::new(w / 2.0, 0.0), Pos2::new(w, h), Pos2::new(0.0, h));
            let edge = distance_to_line_segment(p, a, b)
                .min(distance_to_line_segment(p, b, c))
                .min(distance_to_line_segment(p, c, a));
            if point_in_triangle(p, a, b, c) { -edge } else { edge }
        }
        ShapeKind::Line => {
            let distance = distance_to_line_segment(p, Pos2::ZERO, Pos2::new(w, h));
            let (color, half_width) = match shape.stroke {
                Some(stroke) => (stroke.color, stroke.width / 2.0),
                None => (shape.fill?, 0.5),
            };
            return (distance <= half_width).then_some(color);
        }
    };

    if let Some(stroke) = shape.stroke {
        if edge_distance.abs() <= half_stroke {
            return Some(stroke.color);
        }
    }
    if edge_distance <= 0.0 { shape.fill } else { None }
}

fn point_in_triangle(p: Pos2, a: Pos2, b: Pos2, c: Pos2) -> bool {
    let cross = |o: Pos2, u: Pos2, v: Pos2| (u.x - o.x) * (v.y - o.y) - (u.y - o.y) * (v.x - o.x);
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Distance from a point to a line segment
pub(crate) fn distance_to_line_segment(point: Pos2, line_start: Pos2, line_end: Pos2) -> f32 {
    let line_vec = line_end - line_start;
    let point_vec = point - line_start;

    let line_len = line_vec.length();
    if line_len == 0.0 {
        return point_vec.length();
    }

    let t = ((point_vec.x * line_vec.x + point_vec.y * line_vec.y) / line_len).clamp(0.0, line_len);
    let projection = line_start + (line_vec * t / line_len);
    (point - projection).length()
}

/// Bounding box of a set of points, grown by `padding` on every side
pub(crate) fn calculate_bounds(points: &[Pos2], padding: f32) -> Rect {
    if points.is_empty() {
        return Rect::NOTHING;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Rect::from_min_max(
        Pos2::new(min_x - padding, min_y - padding),
        Pos2::new(max_x + padding, max_y + padding),
    )
}

/// Source-over compositing with a separable blend mode.
fn composite(src: Color32, dst: Rgba<u8>, opacity: f32, layer: &Layer) -> Rgba<u8> {
    let [sr, sg, sb, sa] = src.to_srgba_unmultiplied();
    let sa = f32::from(sa) / 255.0 * opacity;
    if sa <= 0.0 {
        return dst;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let channel = |s: u8, d: u8| {
        let s = f32::from(s) / 255.0;
        let d = f32::from(d) / 255.0;
        let blended = (1.0 - da) * s + da * layer.blend_mode.blend_channel(s, d);
        let c = (blended * sa + d * da * (1.0 - sa)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(sr, dst[0]),
        channel(sg, dst[1]),
        channel(sb, dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::layer::{BlendMode, DrawingPath, ImageContent, ShapeStroke, Transform};

    fn image_layer(pixels: RgbaImage) -> Layer {
        Layer::new("img", LayerContent::Image(ImageContent::new(Bitmap::new(pixels))))
    }

    #[test]
    fn image_is_placed_by_transform() {
        let mut surface = CpuSurface::new(6, 6);
        let mut layer = image_layer(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        layer.transform = Transform::at(3.0, 1.0);
        surface.draw_layer(&layer);

        assert_eq!(surface.target().get_pixel(3, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(surface.target().get_pixel(4, 2), &Rgba([255, 0, 0, 255]));
        assert_eq!(surface.target().get_pixel(2, 1), &Rgba([0, 0, 0, 0]));
        assert_eq!(surface.target().get_pixel(5, 3), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn scale_enlarges_image() {
        let mut surface = CpuSurface::new(4, 4);
        let mut layer = image_layer(RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255])));
        layer.transform.scale_x = 4.0;
        layer.transform.scale_y = 4.0;
        surface.draw_layer(&layer);
        assert!(surface.target().pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn opacity_blends_over_background() {
        let mut surface = CpuSurface::new(1, 1);
        surface.draw_layer(&image_layer(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]))));
        let mut white = image_layer(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])));
        white.opacity = 0.5;
        surface.draw_layer(&white);
        assert_eq!(surface.target().get_pixel(0, 0), &Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn multiply_darkens() {
        let mut surface = CpuSurface::new(1, 1);
        surface.draw_layer(&image_layer(RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 255]))));
        let mut top = image_layer(RgbaImage::from_pixel(1, 1, Rgba([128, 255, 0, 255])));
        top.blend_mode = BlendMode::Multiply;
        surface.draw_layer(&top);
        let px = surface.target().get_pixel(0, 0);
        assert_eq!(px[1], 200);
        assert_eq!(px[2], 0);
        assert!(px[0] < 128);
    }

    #[test]
    fn shapes_fill_and_stroke() {
        let mut surface = CpuSurface::new(10, 10);
        let mut shape = ShapeContent::rectangle(10.0, 10.0);
        shape.fill = Some(Color32::RED);
        shape.stroke = Some(ShapeStroke {
            color: Color32::BLUE,
            width: 2.0,
        });
        surface.draw_layer(&Layer::new("rect", LayerContent::Shape(shape)));

        assert_eq!(surface.target().get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
        assert_eq!(surface.target().get_pixel(0, 5), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn ellipse_leaves_corners_empty() {
        let mut surface = CpuSurface::new(10, 10);
        let shape = ShapeContent::ellipse(10.0, 10.0);
        surface.draw_layer(&Layer::new("ellipse", LayerContent::Shape(shape)));
        assert_eq!(surface.target().get_pixel(0, 0)[3], 0);
        assert_eq!(surface.target().get_pixel(5, 5)[3], 255);
    }

    #[test]
    fn drawing_paths_are_stroked() {
        let mut surface = CpuSurface::new(10, 10);
        let path = DrawingPath::new(
            Color32::WHITE,
            2.0,
            vec![Pos2::new(0.0, 5.0), Pos2::new(10.0, 5.0)],
        );
        let drawing = DrawingContent::new(vec![path]);
        surface.draw_layer(&Layer::new("ink", LayerContent::Drawing(drawing)));

        assert_eq!(surface.target().get_pixel(4, 4), &Rgba([255, 255, 255, 255]));
        assert_eq!(surface.target().get_pixel(4, 0)[3], 0);
    }

    #[test]
    fn distance_to_segment() {
        let d = distance_to_line_segment(Pos2::new(5.0, 3.0), Pos2::ZERO, Pos2::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-5);
        let d = distance_to_line_segment(Pos2::new(-4.0, 3.0), Pos2::ZERO, Pos2::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);
    }
}
