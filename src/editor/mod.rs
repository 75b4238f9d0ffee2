//! The orchestrator that ties layers, history, filters, loading and
//! composition together.
//!
//! The editor subscribes an inbox to each component's event bus and drains
//! them after every delegated call. That way reactions (dirty flag, history
//! push, render request) run after the component has finished mutating, never
//! from inside one of its emits.

use egui::Vec2;

use crate::bitmap::Bitmap;
use crate::error::Result;
use crate::event::{EditorEvent, EventBus, EventInbox, HistoryEvent, LayerEvent, ViewEvent};
use crate::filter::{Filter, FilterEngine};
use crate::history::{deserialize_state, DocumentState, HistoryManager, HistoryStatus};
use crate::layer::{
    AdjustmentContent, DrawingContent, ImageContent, Layer, LayerChanges, LayerContent, LayerId,
    LayerManager, ShapeContent, TextContent,
};
use crate::loader::{to_data_url, Fetch, ImageSource, OfflineFetcher, ResourceLoader, Size};
use crate::renderer::{Compositor, CpuSurface, ExportFormat, RasterSurface};

mod config;
mod tool;

pub use config::{EditorConfig, EditorSettings};
pub use tool::Tool;

const BACKGROUND_LAYER_NAME: &str = "Background";

#[derive(Debug)]
pub struct Editor<S = CpuSurface, F = OfflineFetcher> {
    settings: EditorSettings,
    layers: LayerManager,
    history: HistoryManager,
    filters: FilterEngine,
    compositor: Compositor<S>,
    loader: ResourceLoader<F>,
    events: EventBus<EditorEvent>,
    layer_inbox: EventInbox<LayerEvent>,
    history_inbox: EventInbox<HistoryEvent>,
    view_inbox: EventInbox<ViewEvent>,
    tool: Tool,
    dirty: bool,
    canvas_size: Size,
    original_image_size: Option<Size>,
    render_pending: bool,
}

impl<S: RasterSurface, F: Fetch> Editor<S, F> {
    /// Build an editor. Loads `config.image` when given, otherwise starts with
    /// a blank canvas of the configured size. Either way history starts with
    /// one entry.
    pub async fn new(config: EditorConfig, surface: S, fetcher: F) -> Result<Self> {
        let settings = config.settings;
        let layers = LayerManager::new();
        let history = HistoryManager::new(settings.max_history_steps);
        let mut compositor = Compositor::new(surface, settings.zoom_limits());
        compositor.set_canvas_size(settings.width, settings.height);

        let (_, layer_inbox) = layers.events().inbox();
        let (_, history_inbox) = history.events().inbox();
        let (_, view_inbox) = compositor.events().inbox();

        let mut editor = Self {
            canvas_size: Size::new(settings.width, settings.height),
            settings,
            layers,
            history,
            filters: FilterEngine::with_builtins(),
            compositor,
            loader: ResourceLoader::new(fetcher),
            events: EventBus::new(),
            layer_inbox,
            history_inbox,
            view_inbox,
            tool: Tool::default(),
            dirty: false,
            original_image_size: None,
            render_pending: false,
        };

        match config.image {
            Some(source) => editor.load_image(source).await?,
            None => {
                editor.push_history("New document");
                editor.schedule_render();
                editor.pump();
            }
        }
        log::info!(
            "Editor ready with a {}x{} canvas",
            editor.canvas_size.width,
            editor.canvas_size.height
        );
        Ok(editor)
    }

    pub fn events(&self) -> &EventBus<EditorEvent> {
        &self.events
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    /// For registering custom filters and presets.
    pub fn filters_mut(&mut self) -> &mut FilterEngine {
        &mut self.filters
    }

    pub fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn original_image_size(&self) -> Option<Size> {
        self.original_image_size
    }

    /// Replace the document with a single background layer holding `source`.
    pub async fn load_image(&mut self, source: impl Into<ImageSource>) -> Result<()> {
        let loaded = self.loader.load(source.into()).await?;
        let size = loaded.size;

        let background = Layer::new(
            BACKGROUND_LAYER_NAME,
            LayerContent::Image(ImageContent::new(loaded.element)),
        );
        let id = background.id;
        self.layers.restore_from_layers(vec![background], Some(id), &[id]);

        self.canvas_size = size;
        self.original_image_size = Some(size);
        self.compositor.set_canvas_size(size.width, size.height);

        self.history.clear();
        self.dirty = false;
        self.try_push_history("Load image")?;

        log::info!(
            "Loaded {}x{} image from {}",
            size.width,
            size.height,
            loaded.original_src.as_deref().unwrap_or("memory")
        );
        self.events.emit(&EditorEvent::ImageLoaded {
            width: size.width,
            height: size.height,
        });
        self.schedule_render();
        self.pump();
        Ok(())
    }

    /// Run a layer manager operation and react to what it emitted.
    fn with_layers<T>(&mut self, f: impl FnOnce(&mut LayerManager) -> T) -> T {
        let out = f(&mut self.layers);
        self.pump();
        out
    }

    pub fn add_image_layer(&mut self, name: impl Into<String>, source: Bitmap) -> LayerId {
        self.with_layers(|layers| layers.add_image_layer(name, source))
    }

    pub fn add_text_layer(&mut self, name: impl Into<String>, text: TextContent) -> LayerId {
        self.with_layers(|layers| layers.add_text_layer(name, text))
    }

    pub fn add_shape_layer(&mut self, name: impl Into<String>, shape: ShapeContent) -> LayerId {
        self.with_layers(|layers| layers.add_shape_layer(name, shape))
    }

    pub fn add_drawing_layer(&mut self, name: impl Into<String>, drawing: DrawingContent) -> LayerId {
        self.with_layers(|layers| layers.add_drawing_layer(name, drawing))
    }

    pub fn add_sticker_layer(&mut self, name: impl Into<String>, source: Bitmap) -> LayerId {
        self.with_layers(|layers| layers.add_sticker_layer(name, source))
    }

    pub fn add_adjustment_layer(
        &mut self,
        name: impl Into<String>,
        adjustment: AdjustmentContent,
    ) -> LayerId {
        self.with_layers(|layers| layers.add_adjustment_layer(name, adjustment))
    }

    pub fn update_layer(&mut self, id: LayerId, changes: &LayerChanges) -> bool {
        self.with_layers(|layers| layers.update_layer(id, changes))
    }

    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        self.with_layers(|layers| layers.remove_layer(id).is_some())
    }

    pub fn reorder_layers(&mut self, new_order: &[LayerId]) -> bool {
        self.with_layers(|layers| layers.reorder_layers(new_order))
    }

    pub fn move_layer_up(&mut self, id: LayerId) -> bool {
        self.with_layers(|layers| layers.move_layer_up(id))
    }

    pub fn move_layer_down(&mut self, id: LayerId) -> bool {
        self.with_layers(|layers| layers.move_layer_down(id))
    }

    pub fn select_layer(&mut self, id: LayerId, additive: bool) -> bool {
        self.with_layers(|layers| layers.select_layer(id, additive))
    }

    pub fn deselect_layer(&mut self, id: LayerId) -> bool {
        self.with_layers(|layers| layers.deselect_layer(id))
    }

    pub fn clear_selection(&mut self) {
        self.with_layers(LayerManager::clear_selection);
    }

    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        self.with_layers(|layers| layers.duplicate_layer(id))
    }

    /// Re-filter an image layer from its unedited pixels. The previous filter
    /// chain is replaced, not extended.
    pub fn apply_filters_to_layer(&mut self, id: LayerId, filters: Vec<Filter>) -> bool {
        let Some(layer) = self.layers.get_layer(id) else {
            return false;
        };
        let LayerContent::Image(image) = &layer.content else {
            log::warn!(
                "Filters only apply to image layers; {} is a {} layer",
                id,
                layer.layer_type().as_str()
            );
            return false;
        };

        let original = image
            .original_source
            .clone()
            .unwrap_or_else(|| image.source.clone());
        let pixels = self.filters.apply_filters(original.to_rgba(), &filters);
        let content = LayerContent::Image(ImageContent {
            source: Bitmap::new(pixels),
            original_source: Some(original),
            filters,
        });

        self.update_layer(id, &LayerChanges::new().content(content))
    }

    pub fn apply_preset_to_layer(&mut self, id: LayerId, preset: &str) -> bool {
        let Some(chain) = self.filters.preset(preset).map(<[Filter]>::to_vec) else {
            log::warn!("Unknown preset: {}", preset);
            return false;
        };
        self.apply_filters_to_layer(id, chain)
    }

    /// Put the unedited pixels back and forget the filter chain.
    pub fn reset_layer_filters(&mut self, id: LayerId) -> bool {
        let Some(LayerContent::Image(image)) = self.layers.get_layer(id).map(|l| &l.content) else {
            return false;
        };
        let Some(original) = image.original_source.clone() else {
            return false;
        };
        let content = LayerContent::Image(ImageContent::new(original));
        self.update_layer(id, &LayerChanges::new().content(content))
    }

    /// Step back one entry. Returns false when there is nothing to undo.
    ///
    /// The snapshot is fully decoded before anything changes, so a failed
    /// decode leaves both the document and the history pointer untouched.
    pub async fn undo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.peek_undo() else {
            return Ok(false);
        };
        let state = deserialize_state(&entry.state).await?;
        self.history.undo();
        self.apply_state(state);
        Ok(true)
    }

    /// Step forward one entry. Returns false when there is nothing to redo.
    pub async fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.peek_redo() else {
            return Ok(false);
        };
        let state = deserialize_state(&entry.state).await?;
        self.history.redo();
        self.apply_state(state);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.status()
    }

    /// Group the following edits into a single history entry.
    pub fn start_batch(&mut self) {
        self.history.start_batch();
    }

    pub fn end_batch(&mut self, action: &str) -> bool {
        let state = self.document_state();
        let pushed = match self.history.end_batch(action, &state) {
            Ok(pushed) => pushed,
            Err(err) => {
                log::error!("Failed to record '{}': {}", action, err);
                false
            }
        };
        self.pump();
        pushed
    }

    pub fn cancel_batch(&mut self) {
        self.history.cancel_batch();
    }

    /// Record the current document under `action`.
    pub fn push_history(&mut self, action: &str) -> bool {
        match self.try_push_history(action) {
            Ok(pushed) => pushed,
            Err(err) => {
                log::error!("Failed to record '{}': {}", action, err);
                false
            }
        }
    }

    fn try_push_history(&mut self, action: &str) -> Result<bool> {
        let state = self.document_state();
        self.history.push(action, &state)
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        let old = std::mem::replace(&mut self.tool, tool);
        log::debug!("Tool changed from {} to {}", old, tool);
        self.events.emit(&EditorEvent::ToolChanged { old, new: tool });
    }

    pub fn resize_canvas(&mut self, width: u32, height: u32) {
        let size = Size::new(width, height);
        if size == self.canvas_size {
            return;
        }
        self.canvas_size = size;
        self.compositor.set_canvas_size(width, height);
        self.dirty = true;
        self.push_history("Resize canvas");
        self.schedule_render();
        self.pump();
    }

    /// Declare the current document saved.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Flush pending edits and encode the composed image. `quality` defaults
    /// to the configured export quality.
    pub fn export(&mut self, format: ExportFormat, quality: Option<f32>) -> Result<Vec<u8>> {
        self.flush_render();
        let quality = quality.unwrap_or(self.settings.export_quality);
        let bytes = self.compositor.export(format, quality)?;
        self.events.emit(&EditorEvent::ImageExported {
            format: format.as_str(),
            bytes: bytes.len(),
        });
        Ok(bytes)
    }

    pub fn export_data_url(&mut self, format: ExportFormat, quality: Option<f32>) -> Result<String> {
        let bytes = self.export(format, quality)?;
        Ok(to_data_url(format.mime(), &bytes))
    }

    pub fn zoom(&self) -> f32 {
        self.compositor.zoom()
    }

    pub fn pan(&self) -> Vec2 {
        self.compositor.pan()
    }

    /// Run a view operation and forward the events it produced.
    fn with_view(&mut self, f: impl FnOnce(&mut Compositor<S>)) {
        f(&mut self.compositor);
        self.pump();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.with_view(|view| view.set_zoom(zoom));
    }

    pub fn zoom_in(&mut self) {
        self.with_view(Compositor::zoom_in);
    }

    pub fn zoom_out(&mut self) {
        self.with_view(Compositor::zoom_out);
    }

    pub fn reset_zoom(&mut self) {
        self.with_view(Compositor::reset_zoom);
    }

    pub fn fit_to_screen(&mut self) {
        self.with_view(Compositor::fit_to_screen);
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.with_view(|view| view.set_pan(pan));
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.with_view(|view| view.pan_by(delta));
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.compositor.set_viewport_size(size);
    }

    /// Ask for a repaint at the next [`Self::flush_render`].
    pub fn schedule_render(&mut self) {
        self.render_pending = true;
    }

    pub fn is_render_pending(&self) -> bool {
        self.render_pending
    }

    /// Paint once if anything asked for it since the last flush.
    pub fn flush_render(&mut self) -> bool {
        if !self.render_pending {
            return false;
        }
        self.render_pending = false;
        self.compositor.render(self.layers.get_layers());
        log::debug!("Rendered {} layers", self.layers.len());
        self.events.emit(&EditorEvent::Render);
        true
    }

    /// The live document as a history snapshot would see it.
    pub fn document_state(&self) -> DocumentState {
        DocumentState {
            layers: self.layers.get_layers().into_iter().cloned().collect(),
            active_layer_id: self.layers.active_id(),
            selected_layer_ids: self.layers.selected_ids().to_vec(),
            tool: self.tool,
            zoom: self.compositor.zoom(),
            pan: self.compositor.pan(),
            canvas_size: self.canvas_size,
            original_image_size: self.original_image_size,
            is_dirty: self.dirty,
        }
    }

    fn apply_state(&mut self, state: DocumentState) {
        self.layers.restore_from_layers(
            state.layers,
            state.active_layer_id,
            &state.selected_layer_ids,
        );
        self.set_tool(state.tool);
        self.canvas_size = state.canvas_size;
        self.original_image_size = state.original_image_size;
        self.compositor
            .set_canvas_size(state.canvas_size.width, state.canvas_size.height);
        self.compositor.set_zoom(state.zoom);
        self.compositor.set_pan(state.pan);
        self.dirty = state.is_dirty;
        self.schedule_render();
        self.pump();
    }

    /// Drain every component inbox: layer changes first, since they may push
    /// history, then history and view events.
    fn pump(&mut self) {
        let mut record = None;
        for event in self.layer_inbox.drain() {
            if event.is_structural() {
                record = Some(history_label(&event));
            }
            self.events.emit(&EditorEvent::Layer(event));
        }
        if let Some(action) = record {
            self.dirty = true;
            self.push_history(action);
            self.schedule_render();
        }

        for event in self.history_inbox.drain() {
            self.events.emit(&EditorEvent::History(event));
        }
        for event in self.view_inbox.drain() {
            self.events.emit(&EditorEvent::View(event));
        }
    }
}

fn history_label(event: &LayerEvent) -> &'static str {
    match event {
        LayerEvent::Added { .. } => "Add layer",
        LayerEvent::Removed { .. } => "Remove layer",
        LayerEvent::Updated { .. } => "Update layer",
        LayerEvent::Reordered { .. } => "Reorder layers",
        LayerEvent::SelectionChanged { .. } => "Select layer",
    }
}
