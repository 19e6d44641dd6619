//! Image format detection from magic bytes
//!
//! Declared MIME types and file extensions are routinely wrong (a PNG saved
//! as `.jpg`, a clipboard WebP labelled PNG). Backends that validate the
//! declared media type reject such mismatches, so adapters trust the bytes.

use super::compress::CompressionError;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Image container detected from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Tiff,
    Unknown,
}

impl DetectedFormat {
    /// MIME type for a recognized format
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            Self::Jpeg => Some("image/jpeg"),
            Self::Png => Some("image/png"),
            Self::Gif => Some("image/gif"),
            Self::WebP => Some("image/webp"),
            Self::Bmp => Some("image/bmp"),
            Self::Tiff => Some("image/tiff"),
            Self::Unknown => None,
        }
    }

    /// Whether the source encoding already discards detail
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// Sniff the image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> DetectedFormat {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => DetectedFormat::Jpeg,
        Ok(ImageFormat::Png) => DetectedFormat::Png,
        Ok(ImageFormat::Gif) => DetectedFormat::Gif,
        Ok(ImageFormat::WebP) => DetectedFormat::WebP,
        Ok(ImageFormat::Bmp) => DetectedFormat::Bmp,
        Ok(ImageFormat::Tiff) => DetectedFormat::Tiff,
        _ => DetectedFormat::Unknown,
    }
}

/// Detected MIME type, else the declared one, else JPEG
pub fn resolve_mime_type(bytes: &[u8], declared: &str) -> String {
    if let Some(mime) = detect_format(bytes).mime_type() {
        return mime.to_string();
    }

    let declared = declared.trim();
    if declared.starts_with("image/") {
        declared.to_string()
    } else {
        "image/jpeg".to_string()
    }
}

/// Read pixel dimensions from the image header without a full decode
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), CompressionError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CompressionError::CompressionFailed(format!("unreadable image: {}", e)))?;

    let (width, height) = reader.into_dimensions().map_err(|e| {
        CompressionError::CompressionFailed(format!("failed to read dimensions: {}", e))
    })?;

    if width == 0 || height == 0 {
        return Err(CompressionError::CompressionFailed(format!(
            "degenerate dimensions {}x{}",
            width, height
        )));
    }

    Ok((width, height))
}
