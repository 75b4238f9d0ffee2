use std::collections::HashMap;

use super::{
    AdjustmentContent, DrawingContent, ImageContent, Layer, LayerChanges, LayerContent, LayerId,
    ShapeContent, StickerContent, TextContent,
};
use crate::bitmap::Bitmap;
use crate::event::{EventBus, LayerEvent};

/// Owns the layers of one document, their z-order and the selection.
///
/// `order` runs bottom to top. Every id in `order` has an entry in `layers` and
/// vice versa; `selected` only holds existing ids, and `active` is `None` or
/// one of `selected`.
#[derive(Debug, Default)]
pub struct LayerManager {
    layers: HashMap<LayerId, Layer>,
    order: Vec<LayerId>,
    selected: Vec<LayerId>,
    active: Option<LayerId>,
    events: EventBus<LayerEvent>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventBus<LayerEvent> {
        &self.events
    }

    pub fn add_image_layer(&mut self, name: impl Into<String>, source: Bitmap) -> LayerId {
        self.add_layer(Layer::new(name, LayerContent::Image(ImageContent::new(source))))
    }

    pub fn add_text_layer(&mut self, name: impl Into<String>, text: TextContent) -> LayerId {
        self.add_layer(Layer::new(name, LayerContent::Text(text)))
    }

    pub fn add_shape_layer(&mut self, name: impl Into<String>, shape: ShapeContent) -> LayerId {
        self.add_layer(Layer::new(name, LayerContent::Shape(shape)))
    }

    pub fn add_drawing_layer(&mut self, name: impl Into<String>, drawing: DrawingContent) -> LayerId {
        self.add_layer(Layer::new(name, LayerContent::Drawing(drawing)))
    }

    pub fn add_sticker_layer(&mut self, name: impl Into<String>, source: Bitmap) -> LayerId {
        self.add_layer(Layer::new(
            name,
            LayerContent::Sticker(StickerContent { source }),
        ))
    }

    pub fn add_adjustment_layer(
        &mut self,
        name: impl Into<String>,
        adjustment: AdjustmentContent,
    ) -> LayerId {
        self.add_layer(Layer::new(name, LayerContent::Adjustment(adjustment)))
    }

    /// Append a prepared layer on top of the stack.
    ///
    /// A layer whose id is already taken is given a fresh one.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let index = self.order.len();
        self.insert_layer(index, layer)
    }

    fn insert_layer(&mut self, index: usize, mut layer: Layer) -> LayerId {
        if self.layers.contains_key(&layer.id) {
            log::warn!("Layer id {} already in use; assigning a new one", layer.id);
            layer.id = LayerId::new();
        }
        let id = layer.id;
        let index = index.min(self.order.len());

        self.layers.insert(id, layer);
        self.order.insert(index, id);

        log::debug!("Added layer {} at index {}", id, index);
        self.events.emit(&LayerEvent::Added { id, index });
        id
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// All layers, bottom to top.
    pub fn get_layers(&self) -> Vec<&Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id)).collect()
    }

    /// Bottom-to-top ids.
    pub fn order(&self) -> &[LayerId] {
        &self.order
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.order.iter().position(|&candidate| candidate == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn selected_ids(&self) -> &[LayerId] {
        &self.selected
    }

    pub fn is_selected(&self, id: LayerId) -> bool {
        self.selected.contains(&id)
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layers.get(&id))
    }

    /// Merge `changes` into a layer. Returns false, without emitting, when the
    /// id is unknown or nothing could be applied.
    pub fn update_layer(&mut self, id: LayerId, changes: &LayerChanges) -> bool {
        let Some(layer) = self.layers.get_mut(&id) else {
            return false;
        };
        let applied = layer.apply_changes(changes);
        if applied.is_empty() {
            return false;
        }
        self.events.emit(&LayerEvent::Updated {
            id,
            changes: applied,
        });
        true
    }

    /// Remove a layer. When it was active, the new topmost layer takes over.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let layer = self.layers.remove(&id)?;
        self.order.retain(|&candidate| candidate != id);
        self.selected.retain(|&candidate| candidate != id);

        if self.active == Some(id) {
            self.active = self.order.last().copied();
            if let Some(top) = self.active {
                if !self.selected.contains(&top) {
                    self.selected.push(top);
                }
            }
        }

        log::debug!("Removed layer {}", id);
        self.events.emit(&LayerEvent::Removed {
            id,
            active_id: self.active,
        });
        Some(layer)
    }

    /// Replace the z-order. `new_order` must be a permutation of the current
    /// ids; anything else is ignored.
    pub fn reorder_layers(&mut self, new_order: &[LayerId]) -> bool {
        if !self.is_permutation(new_order) {
            log::debug!("Ignoring reorder that is not a permutation of the current layers");
            return false;
        }
        if self.order == new_order {
            return false;
        }
        self.order = new_order.to_vec();
        self.emit_reordered();
        true
    }

    fn is_permutation(&self, candidate: &[LayerId]) -> bool {
        if candidate.len() != self.order.len() {
            return false;
        }
        let mut seen = std::collections::HashSet::with_capacity(candidate.len());
        candidate
            .iter()
            .all(|id| self.layers.contains_key(id) && seen.insert(*id))
    }

    /// Swap with the layer above. Returns false when already on top.
    pub fn move_layer_up(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index + 1 < self.order.len() => {
                self.order.swap(index, index + 1);
                self.emit_reordered();
                true
            }
            _ => false,
        }
    }

    /// Swap with the layer below. Returns false when already at the bottom.
    pub fn move_layer_down(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                self.order.swap(index, index - 1);
                self.emit_reordered();
                true
            }
            _ => false,
        }
    }

    fn emit_reordered(&self) {
        self.events.emit(&LayerEvent::Reordered {
            order: self.order.clone(),
        });
    }

    /// Select a layer and make it active. Without `additive`, the previous
    /// selection is replaced.
    pub fn select_layer(&mut self, id: LayerId, additive: bool) -> bool {
        if !self.layers.contains_key(&id) {
            return false;
        }
        if !additive {
            self.selected.clear();
        }
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
        self.active = Some(id);
        self.emit_selection();
        true
    }

    pub fn deselect_layer(&mut self, id: LayerId) -> bool {
        let Some(position) = self.selected.iter().position(|&s| s == id) else {
            return false;
        };
        self.selected.remove(position);
        if self.active == Some(id) {
            self.active = self.selected.last().copied();
        }
        self.emit_selection();
        true
    }

    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() && self.active.is_none() {
            return;
        }
        self.selected.clear();
        self.active = None;
        self.emit_selection();
    }

    fn emit_selection(&self) {
        self.events.emit(&LayerEvent::SelectionChanged {
            selected_ids: self.selected.clone(),
            active_id: self.active,
        });
    }

    /// Copy a layer and place the copy directly above it.
    ///
    /// Raster resources are shared with the original; edits replace a layer's
    /// bitmap rather than writing into it.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let original = self.layers.get(&id)?;
        let index = self.index_of(id)?;

        let mut copy = original.clone();
        copy.id = LayerId::new();
        copy.name = format!("{} (Copy)", original.name);

        Some(self.insert_layer(index + 1, copy))
    }

    /// Drop every layer and the selection. Emits nothing.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.order.clear();
        self.selected.clear();
        self.active = None;
    }

    /// Replace the whole document at once, as undo and redo do. Emits nothing.
    ///
    /// Duplicate layer ids keep their first occurrence. Selection entries for
    /// missing layers are dropped, and an active id that survives is added to
    /// the selection.
    pub fn restore_from_layers(
        &mut self,
        layers: Vec<Layer>,
        active_id: Option<LayerId>,
        selected_ids: &[LayerId],
    ) {
        self.clear();

        for layer in layers {
            if self.layers.contains_key(&layer.id) {
                log::warn!("Dropping duplicate layer {} during restore", layer.id);
                continue;
            }
            self.order.push(layer.id);
            self.layers.insert(layer.id, layer);
        }

        for id in selected_ids {
            if self.layers.contains_key(id) && !self.selected.contains(id) {
                self.selected.push(*id);
            }
        }

        self.active = active_id.filter(|id| self.layers.contains_key(id));
        if let Some(active) = self.active {
            if !self.selected.contains(&active) {
                self.selected.push(active);
            }
        }

        log::debug!("Restored {} layers", self.order.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager_with(names: &[&str]) -> (LayerManager, Vec<LayerId>) {
        let mut manager = LayerManager::new();
        let ids = names
            .iter()
            .map(|name| manager.add_text_layer(*name, TextContent::new(*name)))
            .collect();
        (manager, ids)
    }

    fn record(manager: &LayerManager) -> Rc<RefCell<Vec<LayerEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        manager
            .events()
            .subscribe(move |event: &LayerEvent| sink.borrow_mut().push(event.clone()));
        log
    }

    fn names(manager: &LayerManager) -> Vec<String> {
        manager.get_layers().iter().map(|l| l.name.clone()).collect()
    }

    #[test]
    fn add_appends_on_top_and_emits() {
        let mut manager = LayerManager::new();
        let events = record(&manager);

        let a = manager.add_text_layer("A", TextContent::new("a"));
        let b = manager.add_shape_layer("B", ShapeContent::rectangle(4.0, 4.0));

        assert_eq!(manager.order(), &[a, b]);
        assert_eq!(
            *events.borrow(),
            vec![
                LayerEvent::Added { id: a, index: 0 },
                LayerEvent::Added { id: b, index: 1 }
            ]
        );
    }

    #[test]
    fn move_layer_up_swaps_with_the_layer_above() {
        let (mut manager, ids) = manager_with(&["Layer 1", "Layer 2"]);
        assert!(manager.move_layer_up(ids[0]));
        assert_eq!(names(&manager), vec!["Layer 2", "Layer 1"]);

        assert!(!manager.move_layer_up(ids[0]));
        assert!(manager.move_layer_down(ids[0]));
        assert!(!manager.move_layer_down(ids[0]));
    }

    #[test]
    fn partial_reorder_is_rejected_silently() {
        let (mut manager, ids) = manager_with(&["a", "b", "c"]);
        let events = record(&manager);

        assert!(!manager.reorder_layers(&[ids[2], ids[0]]));
        assert!(!manager.reorder_layers(&[ids[2], ids[0], ids[0]]));
        assert!(!manager.reorder_layers(&[ids[2], ids[0], LayerId::new()]));

        assert_eq!(manager.order(), ids.as_slice());
        assert!(events.borrow().is_empty());

        assert!(manager.reorder_layers(&[ids[2], ids[0], ids[1]]));
        assert_eq!(names(&manager), vec!["c", "a", "b"]);
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn update_emits_only_changed_fields() {
        let (mut manager, ids) = manager_with(&["a"]);
        let events = record(&manager);

        assert!(manager.update_layer(ids[0], &LayerChanges::new().visible(false)));
        assert!(!manager.update_layer(LayerId::new(), &LayerChanges::new().visible(false)));

        assert!(!manager.get_layer(ids[0]).map_or(true, |l| l.visible));
        assert_eq!(
            *events.borrow(),
            vec![LayerEvent::Updated {
                id: ids[0],
                changes: LayerChanges::new().visible(false)
            }]
        );
    }

    #[test]
    fn removing_active_layer_activates_new_top() {
        let (mut manager, ids) = manager_with(&["a", "b", "c"]);
        manager.select_layer(ids[2], false);

        assert!(manager.remove_layer(ids[2]).is_some());
        assert_eq!(manager.active_id(), Some(ids[1]));
        assert_eq!(manager.selected_ids(), &[ids[1]]);

        assert!(manager.remove_layer(ids[2]).is_none());
        manager.remove_layer(ids[1]);
        manager.remove_layer(ids[0]);
        assert_eq!(manager.active_id(), None);
        assert!(manager.selected_ids().is_empty());
    }

    #[test]
    fn selection_tracks_active() {
        let (mut manager, ids) = manager_with(&["a", "b", "c"]);

        manager.select_layer(ids[0], false);
        manager.select_layer(ids[1], true);
        assert_eq!(manager.selected_ids(), &[ids[0], ids[1]]);
        assert_eq!(manager.active_id(), Some(ids[1]));

        manager.select_layer(ids[2], false);
        assert_eq!(manager.selected_ids(), &[ids[2]]);

        assert!(!manager.select_layer(LayerId::new(), false));
        assert_eq!(manager.active_id(), Some(ids[2]));

        manager.select_layer(ids[0], true);
        manager.deselect_layer(ids[0]);
        assert_eq!(manager.active_id(), Some(ids[2]));

        manager.clear_selection();
        assert!(manager.selected_ids().is_empty());
        assert_eq!(manager.active_id(), None);
    }

    #[test]
    fn duplicate_inserts_copy_after_original() {
        let (mut manager, ids) = manager_with(&["a", "b"]);
        let copy = manager.duplicate_layer(ids[0]).unwrap();

        assert_eq!(manager.order(), &[ids[0], copy, ids[1]]);
        assert_ne!(copy, ids[0]);
        assert_eq!(manager.get_layer(copy).unwrap().name, "a (Copy)");
        assert!(manager.duplicate_layer(LayerId::new()).is_none());
    }

    #[test]
    fn restore_is_silent_and_sanitizes_selection() {
        let (mut manager, ids) = manager_with(&["a", "b"]);
        let layers: Vec<Layer> = manager.get_layers().into_iter().cloned().collect();
        let events = record(&manager);

        let ghost = LayerId::new();
        manager.restore_from_layers(layers, Some(ids[1]), &[ghost, ids[0]]);

        assert!(events.borrow().is_empty());
        assert_eq!(manager.order(), ids.as_slice());
        assert_eq!(manager.selected_ids(), &[ids[0], ids[1]]);
        assert_eq!(manager.active_id(), Some(ids[1]));
    }

    #[test]
    fn clear_emits_nothing() {
        let (mut manager, _) = manager_with(&["a"]);
        let events = record(&manager);
        manager.clear();
        assert!(manager.is_empty());
        assert!(events.borrow().is_empty());
    }
}
