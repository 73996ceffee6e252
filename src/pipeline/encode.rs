//! Image encoding: `DynamicImage` → base64 PNG wrapped in [`PageImage`].
//!
//! The generateContent API takes images as base64 `inline_data` parts.
//! PNG keeps rendered glyphs and thin diagram strokes crisp; JPEG ringing
//! around subscripts is enough to turn `x_1` into `x_l`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// One rasterised page, ready for a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number within its file.
    pub page_num: usize,
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
}

impl PageImage {
    /// Wrap already-encoded PNG bytes.
    pub fn from_png_bytes(page_num: usize, png: &[u8]) -> Self {
        Self {
            page_num,
            mime_type: "image/png".to_string(),
            data: STANDARD.encode(png),
        }
    }
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let page = PageImage::from_png_bytes(page_num, &buf);
    debug!("Encoded page {} → {} bytes base64", page_num, page.data.len());
    Ok(page)
}
