use std::sync::Arc;

use image::RgbaImage;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::id_generator::generate_id;

struct BitmapInner {
    pixels: RgbaImage,
    version: u64,
}

/// A live raster resource.
///
/// Cloning a `Bitmap` aliases the same pixels, exactly like handing out a
/// second reference to a decoded image element. Snapshots must never hold one
/// of these; see [`crate::history::EncodedBitmap`].
#[derive(Clone)]
pub struct Bitmap {
    id: u64,
    inner: Arc<RwLock<BitmapInner>>,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Bitmap")
            .field("id", &self.id)
            .field("size", &inner.pixels.dimensions())
            .field("version", &inner.version)
            .finish()
    }
}

/// Two handles are equal when they alias the same resource.
impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}

impl Bitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            id: generate_id(),
            inner: Arc::new(RwLock::new(BitmapInner { pixels, version: 0 })),
        }
    }

    /// A fully transparent bitmap of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::new(width, height))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Incremented on every in-place mutation.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    pub fn width(&self) -> u32 {
        self.inner.read().pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.read().pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.read().pixels.dimensions()
    }

    /// Borrow the pixels for reading.
    pub fn pixels(&self) -> BitmapPixels<'_> {
        BitmapPixels {
            guard: self.inner.read(),
        }
    }

    /// Copy the pixels out into an owned buffer.
    pub fn to_rgba(&self) -> RgbaImage {
        self.inner.read().pixels.clone()
    }

    /// Mutate the pixels in place. Every alias observes the change.
    pub fn modify<T>(&self, f: impl FnOnce(&mut RgbaImage) -> T) -> T {
        let mut inner = self.inner.write();
        inner.version += 1;
        f(&mut inner.pixels)
    }

    pub fn replace(&self, pixels: RgbaImage) {
        self.modify(|current| *current = pixels);
    }

    /// Deep copy into an independent resource with a fresh id.
    pub fn deep_clone(&self) -> Self {
        Self::new(self.to_rgba())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Read guard over a bitmap's pixels.
pub struct BitmapPixels<'a> {
    guard: RwLockReadGuard<'a, BitmapInner>,
}

impl std::ops::Deref for BitmapPixels<'_> {
    type Target = RgbaImage;

    fn deref(&self) -> &RgbaImage {
        &self.guard.pixels
    }
}
