//! Pixel filters: a registry of pure `(pixels, value) -> pixels` functions
//! plus named presets (ordered filter chains).
//!
//! Every built-in touches the RGB channels only, rounds and clamps its output
//! to `[0, 255]`, and leaves alpha as it was.

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

mod builtin;
mod convolution;
mod preset;

pub use convolution::{blur_kernel, blur_radius, box_blur, convolve, sharpen_kernel, Kernel};

/// Signature of a registered filter.
pub type FilterFn = Box<dyn Fn(&RgbaImage, f32) -> RgbaImage>;

/// One step of a filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub value: f32,
    pub enabled: bool,
}

impl Filter {
    pub fn new(filter_type: impl Into<String>, value: f32) -> Self {
        Self {
            filter_type: filter_type.into(),
            value,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// True when applying this filter cannot change any pixel.
    pub fn is_identity(&self) -> bool {
        !self.enabled || self.value == 0.0
    }
}

/// Registry of filter functions and presets.
pub struct FilterEngine {
    filters: HashMap<String, FilterFn>,
    presets: HashMap<String, Vec<Filter>>,
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("filters", &self.filter_types())
            .field("presets", &self.preset_names())
            .finish()
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FilterEngine {
    /// Create an engine with nothing registered.
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
            presets: HashMap::new(),
        }
    }

    /// Create an engine with all built-in filters and presets registered.
    pub fn with_builtins() -> Self {
        let mut engine = Self::empty();
        builtin::register_all(&mut engine);
        preset::register_all(&mut engine);
        log::debug!(
            "Registered {} filters and {} presets",
            engine.filters.len(),
            engine.presets.len()
        );
        engine
    }

    /// Register a filter. Overwrites any previous filter with the same type.
    pub fn register_filter(
        &mut self,
        filter_type: impl Into<String>,
        f: impl Fn(&RgbaImage, f32) -> RgbaImage + 'static,
    ) {
        self.filters.insert(filter_type.into(), Box::new(f));
    }

    /// Register a preset. Overwrites any previous preset with the same name.
    pub fn register_preset(&mut self, name: impl Into<String>, chain: Vec<Filter>) {
        self.presets.insert(name.into(), chain);
    }

    pub fn has_filter(&self, filter_type: &str) -> bool {
        self.filters.contains_key(filter_type)
    }

    pub fn preset(&self, name: &str) -> Option<&[Filter]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    /// Registered filter types, sorted.
    pub fn filter_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.filters.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Registered preset names, sorted.
    pub fn preset_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Apply a single filter. Disabled or zero-valued filters and unknown
    /// filter types return the input unchanged.
    pub fn apply_filter(&self, pixels: RgbaImage, filter: &Filter) -> RgbaImage {
        if filter.is_identity() {
            return pixels;
        }
        match self.filters.get(&filter.filter_type) {
            Some(f) => f(&pixels, filter.value),
            None => {
                log::warn!("Unknown filter type: {}", filter.filter_type);
                pixels
            }
        }
    }

    /// Fold a chain of filters left to right.
    pub fn apply_filters(&self, pixels: RgbaImage, filters: &[Filter]) -> RgbaImage {
        filters
            .iter()
            .fold(pixels, |acc, filter| self.apply_filter(acc, filter))
    }

    /// Apply a named preset. Unknown presets return the input unchanged.
    pub fn apply_preset(&self, pixels: RgbaImage, name: &str) -> RgbaImage {
        match self.presets.get(name) {
            Some(chain) => self.apply_filters(pixels, chain),
            None => {
                log::warn!("Unknown preset: {}", name);
                pixels
            }
        }
    }
}

/// Round and clamp a channel value into a byte.
pub(crate) fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// ITU-R 601 luma with the weights used by the grayscale family of filters.
pub(crate) fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.2989 * r + 0.587 * g + 0.114 * b
}
