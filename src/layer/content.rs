use egui::{Color32, Pos2};
use serde::{Deserialize, Serialize};

use super::LayerType;
use crate::bitmap::Bitmap;
use crate::filter::Filter;

/// Variant-specific data of a layer, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerContent<R = Bitmap> {
    Image(ImageContent<R>),
    Text(TextContent),
    Shape(ShapeContent),
    Drawing(DrawingContent),
    Sticker(StickerContent<R>),
    Adjustment(AdjustmentContent),
}

impl<R> LayerContent<R> {
    pub fn layer_type(&self) -> LayerType {
        match self {
            LayerContent::Image(_) => LayerType::Image,
            LayerContent::Text(_) => LayerType::Text,
            LayerContent::Shape(_) => LayerType::Shape,
            LayerContent::Drawing(_) => LayerType::Drawing,
            LayerContent::Sticker(_) => LayerType::Sticker,
            LayerContent::Adjustment(_) => LayerType::Adjustment,
        }
    }

    /// Raster resources in a stable order: source first, then original source.
    pub fn resources(&self) -> Vec<&R> {
        match self {
            LayerContent::Image(image) => {
                let mut out = vec![&image.source];
                out.extend(image.original_source.as_ref());
                out
            }
            LayerContent::Sticker(sticker) => vec![&sticker.source],
            LayerContent::Text(_)
            | LayerContent::Shape(_)
            | LayerContent::Drawing(_)
            | LayerContent::Adjustment(_) => Vec::new(),
        }
    }

    /// Convert every raster resource, visiting them in [`Self::resources`] order.
    pub fn try_map_resources<R2, E>(
        &self,
        mut f: impl FnMut(&R) -> Result<R2, E>,
    ) -> Result<LayerContent<R2>, E> {
        Ok(match self {
            LayerContent::Image(image) => LayerContent::Image(ImageContent {
                source: f(&image.source)?,
                original_source: image.original_source.as_ref().map(&mut f).transpose()?,
                filters: image.filters.clone(),
            }),
            LayerContent::Sticker(sticker) => LayerContent::Sticker(StickerContent {
                source: f(&sticker.source)?,
            }),
            LayerContent::Text(text) => LayerContent::Text(text.clone()),
            LayerContent::Shape(shape) => LayerContent::Shape(shape.clone()),
            LayerContent::Drawing(drawing) => LayerContent::Drawing(drawing.clone()),
            LayerContent::Adjustment(adjustment) => LayerContent::Adjustment(adjustment.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent<R = Bitmap> {
    pub source: R,
    /// The unedited pixels, kept so filters can be re-applied non-destructively.
    pub original_source: Option<R>,
    pub filters: Vec<Filter>,
}

impl<R> ImageContent<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            original_source: None,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerContent<R = Bitmap> {
    pub source: R,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Light,
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color32,
    pub align: TextAlign,
    pub line_height: f32,
    pub letter_spacing: f32,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: "Arial".to_owned(),
            font_size: 32.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color32::BLACK,
            align: TextAlign::Left,
            line_height: 1.2,
            letter_spacing: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Triangle,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeStroke {
    pub color: Color32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeContent {
    pub kind: ShapeKind,
    pub width: f32,
    pub height: f32,
    pub fill: Option<Color32>,
    pub stroke: Option<ShapeStroke>,
    pub corner_radius: f32,
}

impl ShapeContent {
    pub fn new(kind: ShapeKind, width: f32, height: f32) -> Self {
        Self {
            kind,
            width,
            height,
            fill: Some(Color32::from_gray(128)),
            stroke: None,
            corner_radius: 0.0,
        }
    }

    pub fn rectangle(width: f32, height: f32) -> Self {
        Self::new(ShapeKind::Rectangle, width, height)
    }

    pub fn ellipse(width: f32, height: f32) -> Self {
        Self::new(ShapeKind::Ellipse, width, height)
    }
}

/// One freehand path of a drawing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPath {
    pub points: Vec<Pos2>,
    pub color: Color32,
    pub width: f32,
}

impl DrawingPath {
    pub fn new(color: Color32, width: f32, points: Vec<Pos2>) -> Self {
        Self {
            points,
            color,
            width,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawingContent {
    pub paths: Vec<DrawingPath>,
}

impl DrawingContent {
    pub fn new(paths: Vec<DrawingPath>) -> Self {
        Self { paths }
    }

    /// Appends a path to the drawing
    pub fn add_path(&mut self, path: DrawingPath) {
        self.paths.push(path);
    }

    /// Removes and returns the last path
    pub fn remove_last_path(&mut self) -> Option<DrawingPath> {
        self.paths.pop()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentKind {
    BrightnessContrast,
    HueSaturation,
    Levels,
    Curves,
    ColorBalance,
}

/// Non-destructive adjustment applied over the layers beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentContent {
    pub kind: AdjustmentKind,
    pub settings: serde_json::Value,
}

impl AdjustmentContent {
    pub fn new(kind: AdjustmentKind, settings: serde_json::Value) -> Self {
        Self { kind, settings }
    }
}
