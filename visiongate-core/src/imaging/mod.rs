//! Image handling shared by the adapters
//!
//! Format sniffing from magic bytes plus a size-targeted compression engine.

pub mod compress;
pub mod format;

pub use compress::{
    CompressedImage, CompressionError, CompressionTarget, ImageCompressor, BUDGET_MARGIN,
    MESSAGES_API_IMAGE_LIMIT,
};
pub use format::{detect_format, image_dimensions, resolve_mime_type, DetectedFormat};
