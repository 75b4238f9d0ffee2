use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::DEFAULT_MAX_STEPS;
use crate::loader::ImageSource;
use crate::renderer::{ZoomLimits, DEFAULT_EXPORT_QUALITY};

/// Tunable editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)] // missing fields fall back to their defaults
pub struct EditorSettings {
    /// Blank canvas size used when no initial image is given.
    pub width: u32,
    pub height: u32,
    pub max_history_steps: usize,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Multiplier applied by one zoom in/out step.
    pub zoom_step: f32,
    /// Default quality for lossy exports.
    pub export_quality: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        let zoom = ZoomLimits::default();
        Self {
            width: 800,
            height: 600,
            max_history_steps: DEFAULT_MAX_STEPS,
            min_zoom: zoom.min,
            max_zoom: zoom.max,
            zoom_step: zoom.step,
            export_quality: DEFAULT_EXPORT_QUALITY,
        }
    }
}

impl EditorSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn zoom_limits(&self) -> ZoomLimits {
        let min = self.min_zoom.max(f32::EPSILON);
        ZoomLimits {
            min,
            max: self.max_zoom.max(min),
            step: if self.zoom_step > 1.0 {
                self.zoom_step
            } else {
                ZoomLimits::default().step
            },
        }
    }
}

/// Everything needed to construct an [`super::Editor`].
#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    /// Loaded as the background layer when present.
    pub image: Option<ImageSource>,
    pub settings: EditorSettings,
}

impl EditorConfig {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: None,
            settings: EditorSettings {
                width,
                height,
                ..EditorSettings::default()
            },
        }
    }

    pub fn with_image(image: impl Into<ImageSource>) -> Self {
        Self {
            image: Some(image.into()),
            settings: EditorSettings::default(),
        }
    }

    pub fn settings(mut self, settings: EditorSettings) -> Self {
        self.settings = settings;
        self
    }
}
