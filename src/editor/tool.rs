use serde::{Deserialize, Serialize};

/// The current interaction mode; decides how the embedder interprets pointer input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Move,
    Crop,
    Draw,
    Eraser,
    Text,
    Shape,
    Sticker,
    Filter,
    Pan,
    Zoom,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Move => "move",
            Tool::Crop => "crop",
            Tool::Draw => "draw",
            Tool::Eraser => "eraser",
            Tool::Text => "text",
            Tool::Shape => "shape",
            Tool::Sticker => "sticker",
            Tool::Filter => "filter",
            Tool::Pan => "pan",
            Tool::Zoom => "zoom",
        }
    }

    /// Tools that paint pixels rather than manipulate layers.
    pub fn is_drawing(&self) -> bool {
        matches!(self, Tool::Draw | Tool::Eraser)
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
