use std::sync::Arc;

use egui::Vec2;

use crate::editor::Tool;
use crate::history::HistoryEntry;
use crate::layer::{LayerChanges, LayerId};

/// Emitted by the layer manager after a mutation has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    Added {
        id: LayerId,
        index: usize,
    },
    Removed {
        id: LayerId,
        /// The active layer after the removal.
        active_id: Option<LayerId>,
    },
    /// Carries only the fields that were actually changed.
    Updated {
        id: LayerId,
        changes: LayerChanges,
    },
    SelectionChanged {
        selected_ids: Vec<LayerId>,
        active_id: Option<LayerId>,
    },
    /// The full z-order after the move, bottom to top.
    Reordered {
        order: Vec<LayerId>,
    },
}

impl LayerEvent {
    /// Structural events change what gets rendered; selection does not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, LayerEvent::SelectionChanged { .. })
    }
}

#[derive(Debug, Clone)]
pub enum HistoryEvent {
    /// The pointer moved back; carries the entry now current.
    Undo(Arc<HistoryEntry>),
    /// The pointer moved forward; carries the entry now current.
    Redo(Arc<HistoryEntry>),
    Changed {
        can_undo: bool,
        can_redo: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    ZoomChanged { zoom: f32 },
    PanChanged { pan: Vec2 },
}

/// Everything the editor reports to its embedder.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    Layer(LayerEvent),
    History(HistoryEvent),
    View(ViewEvent),
    ToolChanged { old: Tool, new: Tool },
    ImageLoaded { width: u32, height: u32 },
    ImageExported { format: &'static str, bytes: usize },
    Render,
}

impl EditorEvent {
    /// The wire name of this event, e.g. `"layer:add"`.
    pub fn name(&self) -> &'static str {
        match self {
            EditorEvent::Layer(event) => match event {
                LayerEvent::Added { .. } => "layer:add",
                LayerEvent::Removed { .. } => "layer:remove",
                LayerEvent::Updated { .. } => "layer:update",
                LayerEvent::SelectionChanged { .. } => "layer:select",
                LayerEvent::Reordered { .. } => "layer:reorder",
            },
            EditorEvent::History(event) => match event {
                HistoryEvent::Undo(_) => "history:undo",
                HistoryEvent::Redo(_) => "history:redo",
                HistoryEvent::Changed { .. } => "history:change",
            },
            EditorEvent::View(event) => match event {
                ViewEvent::ZoomChanged { .. } => "zoom:change",
                ViewEvent::PanChanged { .. } => "pan:change",
            },
            EditorEvent::ToolChanged { .. } => "tool:change",
            EditorEvent::ImageLoaded { .. } => "image:load",
            EditorEvent::ImageExported { .. } => "image:export",
            EditorEvent::Render => "render",
        }
    }
}

impl From<LayerEvent> for EditorEvent {
    fn from(event: LayerEvent) -> Self {
        EditorEvent::Layer(event)
    }
}

impl From<HistoryEvent> for EditorEvent {
    fn from(event: HistoryEvent) -> Self {
        EditorEvent::History(event)
    }
}

impl From<ViewEvent> for EditorEvent {
    fn from(event: ViewEvent) -> Self {
        EditorEvent::View(event)
    }
}
