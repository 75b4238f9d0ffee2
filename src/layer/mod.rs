use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::bitmap::Bitmap;

mod content;
mod manager;

pub use content::{
    AdjustmentContent, AdjustmentKind, DrawingContent, DrawingPath, FontStyle, FontWeight,
    ImageContent, LayerContent, ShapeContent, ShapeKind, ShapeStroke, StickerContent, TextAlign,
    TextContent,
};
pub use manager::LayerManager;

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Generates a fresh, random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The discriminant of [`LayerContent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Image,
    Text,
    Shape,
    Drawing,
    Sticker,
    Adjustment,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Image => "image",
            LayerType::Text => "text",
            LayerType::Shape => "shape",
            LayerType::Drawing => "drawing",
            LayerType::Sticker => "sticker",
            LayerType::Adjustment => "adjustment",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
}

impl BlendMode {
    /// Blend one normalized source channel over a destination channel.
    pub fn blend_channel(&self, src: f32, dst: f32) -> f32 {
        match self {
            BlendMode::Normal => src,
            BlendMode::Multiply => src * dst,
            BlendMode::Screen => 1.0 - (1.0 - src) * (1.0 - dst),
            BlendMode::Overlay => {
                if dst < 0.5 {
                    2.0 * src * dst
                } else {
                    1.0 - 2.0 * (1.0 - src) * (1.0 - dst)
                }
            }
            BlendMode::Darken => src.min(dst),
            BlendMode::Lighten => src.max(dst),
            BlendMode::Difference => (src - dst).abs(),
        }
    }
}

/// Represents a transformation that can be applied to a layer.
///
/// Rotation and skew are in degrees. The layer's local origin is its top-left
/// corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub skew_x: f32,
    pub skew_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        const DEFAULT_TRANSFORM: Transform = Transform {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
        };
        DEFAULT_TRANSFORM
    }
}

pub type Matrix3 = [[f32; 3]; 3];

impl Transform {
    /// Creates a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// Local-to-document matrix: scale, then skew, then rotate, then translate.
    pub fn to_matrix(&self) -> Matrix3 {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let tan_x = self.skew_x.to_radians().tan();
        let tan_y = self.skew_y.to_radians().tan();

        let mut result = [
            [self.scale_x, 0.0, 0.0],
            [0.0, self.scale_y, 0.0],
            [0.0, 0.0, 1.0],
        ];

        result = multiply_matrices(&[[1.0, tan_x, 0.0], [tan_y, 1.0, 0.0], [0.0, 0.0, 1.0]], &result);

        result = multiply_matrices(&[[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]], &result);

        multiply_matrices(&[[1.0, 0.0, self.x], [0.0, 1.0, self.y], [0.0, 0.0, 1.0]], &result)
    }

    /// Document-to-local matrix, or `None` when the transform is degenerate
    /// (zero scale).
    pub fn inverse_matrix(&self) -> Option<Matrix3> {
        let m = self.to_matrix();
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = m[1][1] * inv_det;
        let b = -m[0][1] * inv_det;
        let c = -m[1][0] * inv_det;
        let d = m[0][0] * inv_det;
        Some([
            [a, b, -(a * m[0][2] + b * m[1][2])],
            [c, d, -(c * m[0][2] + d * m[1][2])],
            [0.0, 0.0, 1.0],
        ])
    }
}

pub fn apply_matrix(m: &Matrix3, x: f32, y: f32) -> (f32, f32) {
    (
        m[0][0] * x + m[0][1] * y + m[0][2],
        m[1][0] * x + m[1][1] * y + m[1][2],
    )
}

const fn const_multiply_matrices(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut result = [[0.0; 3]; 3];
    let mut i = 0;
    while i < 3 {
        let mut j = 0;
        while j < 3 {
            result[i][j] = 0.0;
            let mut k = 0;
            while k < 3 {
                result[i][j] += a[i][k] * b[k][j];
                k += 1;
            }
            j += 1;
        }
        i += 1;
    }
    result
}

fn multiply_matrices(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    const_multiply_matrices(a, b)
}

/// One addressable element of the document.
///
/// `R` is the raster resource type: live layers hold [`Bitmap`]s, history
/// snapshots hold [`crate::history::EncodedBitmap`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer<R = Bitmap> {
    /// Unique identifier for the layer
    pub id: LayerId,
    /// Display name of the layer
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// In `[0, 1]`
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub transform: Transform,
    #[serde(flatten)]
    pub content: LayerContent<R>,
}

impl<R> Layer<R> {
    pub fn new(name: impl Into<String>, content: LayerContent<R>) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            transform: Transform::default(),
            content,
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.content.layer_type()
    }

    /// Rebuild the layer with every raster resource converted by `f`.
    pub fn try_map_resources<R2, E>(
        &self,
        f: impl FnMut(&R) -> Result<R2, E>,
    ) -> Result<Layer<R2>, E> {
        Ok(Layer {
            id: self.id,
            name: self.name.clone(),
            visible: self.visible,
            locked: self.locked,
            opacity: self.opacity,
            blend_mode: self.blend_mode,
            transform: self.transform,
            content: self.content.try_map_resources(f)?,
        })
    }
}

impl Layer {
    /// Merge `changes` into this layer and return the subset that was applied.
    ///
    /// A content change of a different variant than the layer's own is dropped.
    pub fn apply_changes(&mut self, changes: &LayerChanges) -> LayerChanges {
        let mut applied = LayerChanges::default();

        if let Some(name) = &changes.name {
            self.name = name.clone();
            applied.name = Some(name.clone());
        }
        if let Some(visible) = changes.visible {
            self.visible = visible;
            applied.visible = Some(visible);
        }
        if let Some(locked) = changes.locked {
            self.locked = locked;
            applied.locked = Some(locked);
        }
        if let Some(opacity) = changes.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
            applied.opacity = Some(self.opacity);
        }
        if let Some(blend_mode) = changes.blend_mode {
            self.blend_mode = blend_mode;
            applied.blend_mode = Some(blend_mode);
        }
        if let Some(transform) = changes.transform {
            self.transform = transform;
            applied.transform = Some(transform);
        }
        if let Some(content) = &changes.content {
            if content.layer_type() == self.layer_type() {
                self.content = content.clone();
                applied.content = Some(content.clone());
            } else {
                log::warn!(
                    "Ignoring {} content for {} layer {}",
                    content.layer_type().as_str(),
                    self.layer_type().as_str(),
                    self.id
                );
            }
        }

        applied
    }
}

/// A partial update for [`LayerManager::update_layer`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerChanges {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub opacity: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    pub transform: Option<Transform>,
    pub content: Option<LayerContent>,
}

impl LayerChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = Some(blend_mode);
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn content(mut self, content: LayerContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
    }

    #[test]
    fn default_transform_is_identity_at_origin() {
        let m = Transform::default().to_matrix();
        assert!(approx(apply_matrix(&m, 3.0, 4.0), (3.0, 4.0)));
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = Transform {
            x: 10.0,
            y: -5.0,
            scale_x: 2.0,
            scale_y: 0.5,
            rotation: 30.0,
            skew_x: 10.0,
            skew_y: 0.0,
        };
        let forward = t.to_matrix();
        let inverse = t.inverse_matrix().unwrap();
        let (dx, dy) = apply_matrix(&forward, 7.0, 3.0);
        assert!(approx(apply_matrix(&inverse, dx, dy), (7.0, 3.0)));
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let t = Transform {
            scale_x: 0.0,
            ..Transform::default()
        };
        assert!(t.inverse_matrix().is_none());
    }

    #[test]
    fn apply_changes_reports_only_applied_fields() {
        let mut layer: Layer = Layer::new("Text", LayerContent::Text(TextContent::new("hi")));
        let shape = LayerContent::Shape(ShapeContent::rectangle(10.0, 10.0));

        let applied = layer.apply_changes(&LayerChanges::new().opacity(2.0).content(shape));

        assert_eq!(layer.opacity, 1.0);
        assert_eq!(applied.opacity, Some(1.0));
        assert!(applied.content.is_none());
        assert_eq!(layer.layer_type(), LayerType::Text);
    }

    #[test]
    fn blend_modes() {
        assert_eq!(BlendMode::Normal.blend_channel(0.25, 0.75), 0.25);
        assert_eq!(BlendMode::Multiply.blend_channel(0.5, 0.5), 0.25);
        assert_eq!(BlendMode::Lighten.blend_channel(0.2, 0.6), 0.6);
    }
}
