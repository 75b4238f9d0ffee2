use thiserror::Error;

/// Errors surfaced by resource I/O in the editor core.
///
/// Everyday editing mistakes (unknown layer ids, invalid reorders, undo at the
/// start of history) never produce one of these; they are silent no-ops.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("failed to load image from URL: {url}")]
    UrlLoad { url: String, reason: String },

    #[error("file is not an image: {name} ({mime})")]
    NotAnImage { name: String, mime: String },

    #[error("failed to read file: {name}")]
    FileRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to convert canvas to blob")]
    CanvasEncode(#[source] image::ImageError),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("invalid pixel buffer: expected {expected} bytes for {width}x{height}, got {actual}")]
    InvalidPixelBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("failed to encode {format} export")]
    Export {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to restore snapshot: {0}")]
    Snapshot(String),

    #[error("invalid editor settings: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
