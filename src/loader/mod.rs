//! Turns external image sources into live [`Bitmap`]s.
//!
//! Every loader is `async`: fetching and decoding are the suspension points
//! the editor has to await before it can lay out or render a new image.

use std::path::{Path, PathBuf};

use futures::future::LocalBoxFuture;
use image::imageops::FilterType;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::error::{EditorError, Result};

mod data_url;

pub use data_url::{decode_image, encode_png, parse_data_url, png_data_url, to_data_url, DataUrl};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The largest size with this aspect ratio that fits inside `max_width` x
    /// `max_height`. Never grows; each side is at least one pixel.
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> Self {
        if self.width == 0 || self.height == 0 {
            return *self;
        }
        let ratio = (max_width as f32 / self.width as f32)
            .min(max_height as f32 / self.height as f32)
            .min(1.0);
        Self {
            width: ((self.width as f32 * ratio).round() as u32).max(1),
            height: ((self.height as f32 * ratio).round() as u32).max(1),
        }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// The result of every loader.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub element: Bitmap,
    pub size: Size,
    /// Where the pixels came from, when that can be named (URL or file path).
    pub original_src: Option<String>,
}

impl LoadedImage {
    fn new(element: Bitmap, original_src: Option<String>) -> Self {
        let size = element.dimensions().into();
        Self {
            element,
            size,
            original_src,
        }
    }
}

/// A file on disk. `mime` is guessed from the extension when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub mime: Option<String>,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// The declared MIME type, or one derived from the file extension.
    pub fn mime_type(&self) -> Option<String> {
        if let Some(mime) = self.mime.as_ref().filter(|m| !m.is_empty()) {
            return Some(mime.clone());
        }
        let ext = self.path.extension()?.to_string_lossy().to_lowercase();
        let mime = match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            _ => return None,
        };
        Some(mime.to_owned())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type().is_some_and(|mime| mime.starts_with("image/"))
    }
}

/// Encoded image bytes held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }
}

/// Anything [`ResourceLoader::load`] can ingest.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Url(String),
    File(ImageFile),
    Blob(Blob),
    Bitmap(Bitmap),
    /// An already rasterized surface.
    Canvas(RgbaImage),
    RawPixels {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl From<&str> for ImageSource {
    fn from(url: &str) -> Self {
        ImageSource::Url(url.to_owned())
    }
}

impl From<String> for ImageSource {
    fn from(url: String) -> Self {
        ImageSource::Url(url)
    }
}

impl From<Bitmap> for ImageSource {
    fn from(bitmap: Bitmap) -> Self {
        ImageSource::Bitmap(bitmap)
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(pixels: RgbaImage) -> Self {
        ImageSource::Canvas(pixels)
    }
}

/// Transport for non-`data:` URLs and local files.
pub trait Fetch {
    /// Resolve `url` to its raw bytes, or a reason why it could not be fetched.
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, std::result::Result<Vec<u8>, String>>;

    /// Read a local file.
    ///
    /// The default reads synchronously with `std::fs::read`, blocking the
    /// calling thread until the file is in memory. Executors that must not
    /// block should override it.
    fn read_file<'a>(&'a self, path: &'a Path) -> LocalBoxFuture<'a, std::io::Result<Vec<u8>>> {
        Box::pin(async move { std::fs::read(path) })
    }
}

/// A transport with no network access: every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetch for OfflineFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, std::result::Result<Vec<u8>, String>> {
        Box::pin(async move { Err(format!("no transport configured for {url}")) })
    }
}

/// Keeps error messages readable when the URL is a long `data:` payload.
fn display_url(url: &str) -> String {
    const MAX: usize = 64;
    match url.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_owned(),
    }
}

#[derive(Debug, Default)]
pub struct ResourceLoader<F = OfflineFetcher> {
    fetcher: F,
}

impl<F: Fetch> ResourceLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn load(&self, source: ImageSource) -> Result<LoadedImage> {
        match source {
            ImageSource::Url(url) => self.load_from_url(&url).await,
            ImageSource::File(file) => self.load_from_file(&file).await,
            ImageSource::Blob(blob) => self.load_from_blob(&blob).await,
            ImageSource::Bitmap(bitmap) => self.load_from_bitmap(&bitmap).await,
            ImageSource::Canvas(pixels) => self.load_from_canvas(&pixels).await,
            ImageSource::RawPixels {
                width,
                height,
                data,
            } => self.load_from_raw_pixels(width, height, data).await,
        }
    }

    /// `data:` URLs are decoded in place; anything else goes through the fetcher.
    pub async fn load_from_url(&self, url: &str) -> Result<LoadedImage> {
        let url_error = |reason: String| EditorError::UrlLoad {
            url: display_url(url),
            reason,
        };

        let bytes = if url.starts_with("data:") {
            parse_data_url(url).map_err(url_error)?.bytes
        } else {
            self.fetcher.fetch(url).await.map_err(url_error)?
        };
        let pixels = decode_image(&bytes).map_err(|err| url_error(err.to_string()))?;

        log::info!(
            "Loaded image from URL {} ({}x{})",
            display_url(url),
            pixels.width(),
            pixels.height()
        );
        Ok(LoadedImage::new(Bitmap::new(pixels), Some(url.to_owned())))
    }

    pub async fn load_from_file(&self, file: &ImageFile) -> Result<LoadedImage> {
        if !file.is_image() {
            return Err(EditorError::NotAnImage {
                name: file.name(),
                mime: file.mime_type().unwrap_or_else(|| "unknown".to_owned()),
            });
        }

        let bytes = self
            .fetcher
            .read_file(&file.path)
            .await
            .map_err(|source| EditorError::FileRead {
                name: file.name(),
                source,
            })?;
        log::info!("Processing image from path: {} ({} bytes)", file.name(), bytes.len());

        let pixels = decode_image(&bytes)?;
        Ok(LoadedImage::new(Bitmap::new(pixels), Some(file.name())))
    }

    pub async fn load_from_blob(&self, blob: &Blob) -> Result<LoadedImage> {
        if !blob.mime.is_empty() && !blob.mime.starts_with("image/") {
            return Err(EditorError::NotAnImage {
                name: "blob".to_owned(),
                mime: blob.mime.clone(),
            });
        }
        let pixels = decode_image(&blob.bytes)?;
        log::debug!("Decoded blob: {}x{}", pixels.width(), pixels.height());
        Ok(LoadedImage::new(Bitmap::new(pixels), None))
    }

    /// Goes through a PNG blob so the result is detached from the surface.
    pub async fn load_from_canvas(&self, pixels: &RgbaImage) -> Result<LoadedImage> {
        let blob = Blob::new("image/png", encode_png(pixels)?);
        self.load_from_blob(&blob).await
    }

    pub async fn load_from_raw_pixels(
        &self,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<LoadedImage> {
        if width == 0 || height == 0 {
            return Err(EditorError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * 4;
        let actual = data.len();
        let pixels = RgbaImage::from_raw(width, height, data).ok_or(
            EditorError::InvalidPixelBuffer {
                width,
                height,
                expected,
                actual,
            },
        )?;
        Ok(LoadedImage::new(Bitmap::new(pixels), None))
    }

    /// Wrap a bitmap that is already live. The result aliases it.
    pub async fn load_from_bitmap(&self, bitmap: &Bitmap) -> Result<LoadedImage> {
        Ok(LoadedImage::new(bitmap.clone(), None))
    }
}

/// Proportionally shrink `source` to fit `max_width` x `max_height`.
/// Images that already fit are returned as-is.
pub fn resize_image(source: &RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let current = Size::from(source.dimensions());
    let target = current.fit_within(max_width, max_height);
    if target == current {
        return source.clone();
    }
    log::debug!(
        "Resizing {}x{} to {}x{}",
        current.width,
        current.height,
        target.width,
        target.height
    );
    image::imageops::resize(source, target.width, target.height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use image::Rgba;

    fn red(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(Size::new(400, 200).fit_within(100, 100), Size::new(100, 50));
        assert_eq!(Size::new(40, 20).fit_within(100, 100), Size::new(40, 20));
        assert_eq!(Size::new(3, 1000).fit_within(100, 100), Size::new(1, 100));
    }

    #[test]
    fn resize_image_keeps_aspect_ratio() {
        let out = resize_image(&red(300, 150), 100, 100);
        assert_eq!(out.dimensions(), (100, 50));
        assert_eq!(resize_image(&red(10, 10), 100, 100).dimensions(), (10, 10));
    }

    #[test]
    fn data_urls_load_without_a_transport() {
        let loader = ResourceLoader::new(OfflineFetcher);
        let url = png_data_url(&red(4, 3)).unwrap();
        let loaded = block_on(loader.load_from_url(&url)).unwrap();
        assert_eq!(loaded.size, Size::new(4, 3));
        assert_eq!(loaded.original_src.as_deref(), Some(url.as_str()));
    }

    #[test]
    fn remote_urls_fail_offline() {
        let loader = ResourceLoader::new(OfflineFetcher);
        let err = block_on(loader.load_from_url("https://example.com/cat.png")).unwrap_err();
        assert!(err.to_string().starts_with("failed to load image from URL"));
    }

    #[test]
    fn non_image_files_are_rejected_before_reading() {
        let loader = ResourceLoader::new(OfflineFetcher);
        let file = ImageFile::new("/definitely/missing/notes.txt");
        let err = block_on(loader.load_from_file(&file)).unwrap_err();
        assert!(matches!(err, EditorError::NotAnImage { .. }));

        let file = ImageFile::new("/definitely/missing/photo.png");
        let err = block_on(loader.load_from_file(&file)).unwrap_err();
        assert!(matches!(err, EditorError::FileRead { .. }));
        assert!(err.to_string().starts_with("failed to read file"));
    }

    struct MemoryFiles(Vec<u8>);

    impl Fetch for MemoryFiles {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
        ) -> LocalBoxFuture<'a, std::result::Result<Vec<u8>, String>> {
            Box::pin(async move { Err(format!("no network for {url}")) })
        }

        fn read_file<'a>(&'a self, _path: &'a Path) -> LocalBoxFuture<'a, std::io::Result<Vec<u8>>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
    }

    #[test]
    fn file_reads_go_through_the_fetcher() {
        let loader = ResourceLoader::new(MemoryFiles(encode_png(&red(5, 2)).unwrap()));
        let file = ImageFile::new("/definitely/missing/photo.png");

        let loaded = block_on(loader.load_from_file(&file)).unwrap();

        assert_eq!(loaded.size, Size::new(5, 2));
        assert_eq!(loaded.original_src.as_deref(), Some("/definitely/missing/photo.png"));
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(
            ImageFile::new("a/B.JPG").mime_type().as_deref(),
            Some("image/jpeg")
        );
        assert!(ImageFile::new("a/readme").mime_type().is_none());
        assert!(!ImageFile::new("a.png").with_mime("text/plain").is_image());
    }

    #[test]
    fn raw_pixels_must_match_dimensions() {
        let loader = ResourceLoader::new(OfflineFetcher);
        let err = block_on(loader.load_from_raw_pixels(2, 2, vec![0; 15])).unwrap_err();
        assert!(matches!(
            err,
            EditorError::InvalidPixelBuffer {
                expected: 16,
                actual: 15,
                ..
            }
        ));
        let err = block_on(loader.load_from_raw_pixels(0, 0, Vec::new())).unwrap_err();
        assert!(matches!(err, EditorError::EmptyImage { width: 0, height: 0 }));

        let loaded = block_on(loader.load_from_raw_pixels(2, 2, vec![9; 16])).unwrap();
        assert_eq!(loaded.element.pixels().get_pixel(1, 1), &Rgba([9, 9, 9, 9]));
    }

    #[test]
    fn canvas_and_bitmap_sources() {
        let loader = ResourceLoader::new(OfflineFetcher);
        let canvas = red(5, 5);
        let loaded = block_on(loader.load(ImageSource::Canvas(canvas.clone()))).unwrap();
        assert_eq!(loaded.element.to_rgba(), canvas);

        let bitmap = Bitmap::new(canvas);
        let loaded = block_on(loader.load(bitmap.clone().into())).unwrap();
        assert!(loaded.element.ptr_eq(&bitmap));
    }
}
