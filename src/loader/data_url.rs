use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{EditorError, Result};

/// Encode pixels as PNG bytes.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(pixels.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(EditorError::CanvasEncode)?;
    Ok(bytes)
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Encode pixels as a `data:image/png;base64,...` URL.
pub fn png_data_url(pixels: &RgbaImage) -> Result<String> {
    Ok(to_data_url("image/png", &encode_png(pixels)?))
}

/// A parsed `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Parse a base64 `data:` URL. The error is a short human-readable reason.
pub fn parse_data_url(url: &str) -> std::result::Result<DataUrl, String> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URL".to_owned())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no payload".to_owned())?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| "only base64 data URLs are supported".to_owned())?;
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| err.to_string())?;

    Ok(DataUrl {
        mime: if mime.is_empty() {
            "text/plain".to_owned()
        } else {
            mime.to_owned()
        },
        bytes,
    })
}

/// Decode an encoded image (any format the `image` crate understands) to RGBA.
/// Images without pixels are rejected.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let pixels = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(EditorError::EmptyImage { width, height });
    }
    Ok(pixels)
}
