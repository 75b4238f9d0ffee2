use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use egui::Vec2;
use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::editor::Tool;
use crate::error::{EditorError, Result};
use crate::layer::{Layer, LayerId};
use crate::loader::{decode_image, parse_data_url, png_data_url, Size};

/// A raster resource frozen into a PNG data URL.
///
/// Holds no reference to the bitmap it was made from, so later edits to the
/// live layer cannot leak into history. A bitmap without pixels has no PNG
/// form and is stored with an empty `data_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBitmap {
    pub data_url: Arc<str>,
    pub width: u32,
    pub height: u32,
}

impl EncodedBitmap {
    pub fn encode(bitmap: &Bitmap) -> Result<Self> {
        let pixels = bitmap.pixels();
        let (width, height) = pixels.dimensions();
        let data_url = if width == 0 || height == 0 {
            Arc::from("")
        } else {
            png_data_url(&pixels)?.into()
        };
        Ok(Self {
            data_url,
            width,
            height,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rebuild a fresh, independent bitmap.
    pub fn decode(&self) -> Result<Bitmap> {
        if self.is_empty() {
            return Ok(Bitmap::blank(self.width, self.height));
        }
        let parsed = parse_data_url(&self.data_url).map_err(EditorError::Snapshot)?;
        let pixels = decode_image(&parsed.bytes)?;
        if pixels.dimensions() != (self.width, self.height) {
            return Err(EditorError::Snapshot(format!(
                "expected {}x{} bitmap, decoded {}x{}",
                self.width,
                self.height,
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Bitmap::new(pixels))
    }
}

/// Everything needed to put the editor back into one exact state.
///
/// With the default `R` this holds live layers; [`SerializedState`] is the
/// frozen form stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState<R = Bitmap> {
    /// Bottom to top.
    pub layers: Vec<Layer<R>>,
    pub active_layer_id: Option<LayerId>,
    pub selected_layer_ids: Vec<LayerId>,
    pub tool: Tool,
    pub zoom: f32,
    pub pan: Vec2,
    pub canvas_size: Size,
    pub original_image_size: Option<Size>,
    pub is_dirty: bool,
}

pub type SerializedState = DocumentState<EncodedBitmap>;

impl<R> DocumentState<R> {
    fn with_layers<R2>(&self, layers: Vec<Layer<R2>>) -> DocumentState<R2> {
        DocumentState {
            layers,
            active_layer_id: self.active_layer_id,
            selected_layer_ids: self.selected_layer_ids.clone(),
            tool: self.tool,
            zoom: self.zoom,
            pan: self.pan,
            canvas_size: self.canvas_size,
            original_image_size: self.original_image_size,
            is_dirty: self.is_dirty,
        }
    }
}

/// Remembers the encoding of each bitmap version so unchanged layers are not
/// re-encoded on every push.
#[derive(Debug, Default)]
pub(crate) struct EncodeCache {
    entries: HashMap<u64, (u64, EncodedBitmap)>,
}

impl EncodeCache {
    fn encode(&mut self, bitmap: &Bitmap) -> Result<EncodedBitmap> {
        let version = bitmap.version();
        if let Some((cached_version, encoded)) = self.entries.get(&bitmap.id()) {
            if *cached_version == version {
                return Ok(encoded.clone());
            }
        }
        let encoded = EncodedBitmap::encode(bitmap)?;
        self.entries
            .insert(bitmap.id(), (version, encoded.clone()));
        Ok(encoded)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Freeze a live state. Only bitmaps referenced by `state` stay cached.
pub(crate) fn serialize_state(
    state: &DocumentState,
    cache: &mut EncodeCache,
) -> Result<SerializedState> {
    let layers = state
        .layers
        .iter()
        .map(|layer| layer.try_map_resources(|bitmap| cache.encode(bitmap)))
        .collect::<Result<Vec<_>>>()?;

    let live: HashSet<u64> = state
        .layers
        .iter()
        .flat_map(|layer| layer.content.resources())
        .map(Bitmap::id)
        .collect();
    cache.entries.retain(|id, _| live.contains(id));

    Ok(state.with_layers(layers))
}

/// Thaw a stored state into live layers with freshly decoded bitmaps.
///
/// Resolves only once every layer has been rebuilt; callers must not render
/// or hand layers to the layer manager before then.
pub async fn deserialize_state(state: &SerializedState) -> Result<DocumentState> {
    let layers = futures::future::try_join_all(
        state
            .layers
            .iter()
            .map(|layer| async move { layer.try_map_resources(EncodedBitmap::decode) }),
    )
    .await?;
    log::debug!("Deserialized {} layers", layers.len());
    Ok(state.with_layers(layers))
}
