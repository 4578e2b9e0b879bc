//! Image payload conversion at the wire boundary.
//!
//! Every decoded raster is normalized to 8-bit RGB so the rest of the request
//! path never sees alpha channels or grayscale layouts. Encoding always
//! produces PNG; the output of a generation pass must survive the trip back
//! to the client bit for bit.

use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine};
use image::{ImageFormat, RgbImage};

use crate::TryOnError;

/// Parses image bytes in any common raster encoding into RGB8.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, TryOnError> {
    let img = image::load_from_memory(bytes).map_err(|e| TryOnError::decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Encodes a raster losslessly as PNG.
pub fn encode(img: &RgbImage) -> Result<Vec<u8>, TryOnError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| TryOnError::generation(format!("image encode failed: {e}")))?;
    Ok(bytes)
}

/// Text-safe variant of [`decode`] for transports without binary bodies.
pub fn decode_base64(text: &str) -> Result<RgbImage, TryOnError> {
    let bytes = BASE64_STANDARD
        .decode(text.trim())
        .map_err(|e| TryOnError::decode(format!("invalid base64 image: {e}")))?;
    decode(&bytes)
}

/// Text-safe variant of [`encode`].
pub fn encode_base64(img: &RgbImage) -> Result<String, TryOnError> {
    Ok(BASE64_STANDARD.encode(encode(img)?))
}
