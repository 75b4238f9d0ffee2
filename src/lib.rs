#![warn(clippy::all, rust_2018_idioms)]

pub mod bitmap;
pub mod editor;
pub mod error;
pub mod event;
pub mod filter;
pub mod history;
pub mod layer;
pub mod loader;
pub mod renderer;

mod id_generator;
mod util;

pub use bitmap::Bitmap;
pub use editor::{Editor, EditorConfig, EditorSettings, Tool};
pub use error::{EditorError, Result};
pub use event::{EditorEvent, EventBus, HistoryEvent, LayerEvent, SubscriptionId, ViewEvent};
pub use filter::{Filter, FilterEngine};
pub use history::{DocumentState, HistoryEntry, HistoryManager, HistoryStatus};
pub use layer::{BlendMode, Layer, LayerChanges, LayerContent, LayerId, LayerManager, LayerType, Transform};
pub use loader::{Fetch, ImageSource, LoadedImage, OfflineFetcher, ResourceLoader, Size};
pub use renderer::{Compositor, CpuSurface, ExportFormat, RasterSurface};
