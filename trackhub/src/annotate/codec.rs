//! Base64 image codec.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};

use super::AnnotationError;

/// Decodes a base64 encoded PNG or JPEG into an RGBA raster.
pub fn decode_base64_image(data: &str) -> Result<RgbaImage, AnnotationError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| AnnotationError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AnnotationError::Decode("image is empty".to_string()));
    }
    let image =
        image::load_from_memory(&bytes).map_err(|e| AnnotationError::Decode(e.to_string()))?;
    Ok(image.to_rgba8())
}

/// Encodes an RGBA raster as a base64 PNG.
pub fn encode_base64_png(image: &RgbaImage) -> Result<String, AnnotationError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| AnnotationError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buffer.into_inner()))
}
