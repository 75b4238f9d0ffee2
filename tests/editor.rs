use futures::executor::block_on;
use image::{Rgba, RgbaImage};
use photo_core::layer::TextContent;
use photo_core::loader::{decode_image, parse_data_url, png_data_url};
use photo_core::{
    CpuSurface, Editor, EditorConfig, EditorError, EditorEvent, EditorSettings, ExportFormat,
    Filter, LayerChanges, LayerContent, LayerType, OfflineFetcher, Size, Tool,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const TEAL: Rgba<u8> = Rgba([0, 128, 128, 255]);

fn photo() -> RgbaImage {
    RgbaImage::from_pixel(4, 3, TEAL)
}

fn editor_with_photo() -> Editor {
    let url = png_data_url(&photo()).unwrap();
    block_on(Editor::new(
        EditorConfig::with_image(url),
        CpuSurface::default(),
        OfflineFetcher,
    ))
    .unwrap()
}

fn recorded(editor: &Editor) -> Rc<RefCell<Vec<&'static str>>> {
    let names = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&names);
    editor
        .events()
        .subscribe(move |event: &EditorEvent| sink.borrow_mut().push(event.name()));
    names
}

#[test]
fn test_load_image_creates_background_layer() {
    init_logging();
    let editor = editor_with_photo();

    assert_eq!(editor.layers().len(), 1);
    let background = editor.layers().active_layer().unwrap();
    assert_eq!(background.name, "Background");
    assert_eq!(background.layer_type(), LayerType::Image);

    assert_eq!(editor.canvas_size(), Size::new(4, 3));
    assert_eq!(editor.original_image_size(), Some(Size::new(4, 3)));
    assert_eq!(editor.history().len(), 1);
    assert_eq!(editor.history().entries()[0].action, "Load image");
    assert!(!editor.is_dirty());
}

#[test]
fn test_export_png_matches_loaded_photo() {
    init_logging();
    let mut editor = editor_with_photo();
    let names = recorded(&editor);

    let bytes = editor.export(ExportFormat::Png, None).unwrap();
    let exported = decode_image(&bytes).unwrap();

    assert_eq!(exported.dimensions(), (4, 3));
    assert_eq!(exported.get_pixel(2, 1), &TEAL);
    assert_eq!(*names.borrow(), vec!["render", "image:export"]);
}

#[test]
fn test_export_data_url_carries_mime() {
    init_logging();
    let mut editor = editor_with_photo();

    let url = editor.export_data_url(ExportFormat::Jpeg, Some(0.5)).unwrap();
    let parsed = parse_data_url(&url).unwrap();

    assert_eq!(parsed.mime, "image/jpeg");
    assert_eq!(decode_image(&parsed.bytes).unwrap().dimensions(), (4, 3));
}

#[test]
fn test_bad_source_is_reported_and_editor_not_built() {
    init_logging();
    let result = block_on(Editor::new(
        EditorConfig::with_image("https://example.com/photo.png"),
        CpuSurface::default(),
        OfflineFetcher,
    ));
    assert!(matches!(result, Err(EditorError::UrlLoad { .. })));
}

#[test]
fn test_edit_undo_redo_round_trip() {
    init_logging();
    let mut editor = editor_with_photo();
    let background = editor.layers().order()[0];

    let title = editor.add_text_layer("Title", TextContent::new("Hello"));
    editor.update_layer(title, &LayerChanges::new().opacity(0.5));
    assert!(editor.apply_preset_to_layer(background, "noir"));
    assert_eq!(editor.history().len(), 4);

    assert!(block_on(editor.undo()).unwrap());
    let Some(LayerContent::Image(image)) = editor.layers().get_layer(background).map(|l| &l.content)
    else {
        panic!("background should still be an image layer");
    };
    assert!(image.filters.is_empty());
    assert_eq!(image.source.to_rgba().get_pixel(0, 0), &TEAL);

    assert!(block_on(editor.undo()).unwrap());
    assert_eq!(editor.layers().get_layer(title).unwrap().opacity, 1.0);

    assert!(block_on(editor.redo()).unwrap());
    assert!(block_on(editor.redo()).unwrap());
    let Some(LayerContent::Image(image)) = editor.layers().get_layer(background).map(|l| &l.content)
    else {
        panic!("background should still be an image layer");
    };
    assert_eq!(image.filters, vec![Filter::new("grayscale", 1.0), Filter::new("contrast", 0.3)]);
    assert!(!editor.can_redo());
}

#[test]
fn test_batch_groups_edits() {
    init_logging();
    let mut editor = editor_with_photo();
    let background = editor.layers().order()[0];

    editor.start_batch();
    for step in 1..=5 {
        let mut transform = editor.layers().get_layer(background).unwrap().transform;
        transform.x = step as f32;
        editor.update_layer(background, &LayerChanges::new().transform(transform));
    }
    assert!(editor.end_batch("Move layer"));

    let actions: Vec<_> = editor.history().entries().iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["Load image", "Move layer"]);
    assert!(editor.is_dirty());
}

#[test]
fn test_settings_flow_into_editor() {
    init_logging();
    let settings = EditorSettings::from_json(r#"{ "width": 32, "height": 16, "max_history_steps": 2 }"#)
        .unwrap();
    let mut editor = block_on(Editor::new(
        EditorConfig::default().settings(settings),
        CpuSurface::default(),
        OfflineFetcher,
    ))
    .unwrap();

    assert_eq!(editor.canvas_size(), Size::new(32, 16));
    for name in ["a", "b", "c"] {
        editor.add_text_layer(name, TextContent::new(name));
    }
    assert_eq!(editor.history().len(), 2);

    editor.set_tool(Tool::Crop);
    editor.zoom_in();
    assert!(editor.zoom() > 1.0);
    editor.reset_zoom();
    assert_eq!(editor.zoom(), 1.0);
}
