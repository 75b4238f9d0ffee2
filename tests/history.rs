use egui::Vec2;
use futures::executor::block_on;
use image::{Rgba, RgbaImage};
use photo_core::history::deserialize_state;
use photo_core::layer::ImageContent;
use photo_core::{
    Bitmap, DocumentState, HistoryManager, HistoryStatus, Layer, LayerContent, Size, Tool,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn solid(color: [u8; 4]) -> Bitmap {
    Bitmap::new(RgbaImage::from_pixel(3, 2, Rgba(color)))
}

fn document(layers: Vec<Layer>) -> DocumentState {
    DocumentState {
        active_layer_id: layers.last().map(|layer| layer.id),
        selected_layer_ids: layers.last().map(|layer| layer.id).into_iter().collect(),
        layers,
        tool: Tool::Draw,
        zoom: 2.0,
        pan: Vec2::new(5.0, -3.0),
        canvas_size: Size::new(3, 2),
        original_image_size: Some(Size::new(3, 2)),
        is_dirty: true,
    }
}

fn actions(history: &HistoryManager) -> Vec<&str> {
    history.entries().iter().map(|e| e.action.as_str()).collect()
}

#[test]
fn test_push_after_undo_discards_redo_branch() {
    init_logging();
    let mut history = HistoryManager::default();
    let state = document(Vec::new());

    history.push("A", &state).unwrap();
    history.push("B", &state).unwrap();
    history.undo();
    history.push("C", &state).unwrap();

    assert_eq!(actions(&history), vec!["A", "C"]);
    assert!(!history.can_redo());
    assert_eq!(history.status(), HistoryStatus::CanUndoOnly);
}

#[test]
fn test_snapshot_is_isolated_from_later_edits() {
    init_logging();
    let mut history = HistoryManager::default();
    let bitmap = solid([255, 0, 0, 255]);
    let layer = Layer::new("Photo", LayerContent::Image(ImageContent::new(bitmap.clone())));
    history.push("Before", &document(vec![layer])).unwrap();

    bitmap.modify(|pixels| pixels.put_pixel(0, 0, Rgba([0, 0, 255, 255])));

    let stored = history.get_current_state().unwrap();
    let restored = block_on(deserialize_state(stored)).unwrap();
    let LayerContent::Image(image) = &restored.layers[0].content else {
        panic!("expected an image layer");
    };
    assert!(!image.source.ptr_eq(&bitmap));
    assert_eq!(image.source.to_rgba().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
}

#[test]
fn test_restored_state_keeps_view_and_selection() {
    init_logging();
    let mut history = HistoryManager::default();
    let layer = Layer::new("Photo", LayerContent::Image(ImageContent::new(solid([1, 2, 3, 4]))));
    let original = document(vec![layer]);
    history.push("Load image", &original).unwrap();

    let restored = block_on(deserialize_state(history.get_current_state().unwrap())).unwrap();

    assert_eq!(restored.layers.len(), 1);
    assert_eq!(restored.layers[0].id, original.layers[0].id);
    assert_eq!(restored.active_layer_id, original.active_layer_id);
    assert_eq!(restored.selected_layer_ids, original.selected_layer_ids);
    assert_eq!(restored.tool, Tool::Draw);
    assert_eq!(restored.zoom, 2.0);
    assert_eq!(restored.pan, Vec2::new(5.0, -3.0));
    assert_eq!(restored.canvas_size, Size::new(3, 2));
    assert!(restored.is_dirty);
}

#[test]
fn test_history_is_bounded() {
    init_logging();
    let mut history = HistoryManager::new(4);
    let state = document(Vec::new());
    for i in 0..10 {
        history.push(format!("step {i}"), &state).unwrap();
    }

    assert_eq!(history.len(), 4);
    assert_eq!(actions(&history), vec!["step 6", "step 7", "step 8", "step 9"]);
    assert_eq!(history.current_index(), Some(3));

    let mut undone = 0;
    while history.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(history.current_entry().unwrap().action, "step 6");
}
