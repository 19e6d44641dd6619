//! Iterative image compression under a byte budget
//!
//! The engine trades resolution and JPEG quality for size: it estimates a
//! linear scale from the byte ratio, then walks scale and quality down for a
//! bounded number of attempts. Results are best effort; callers check
//! `CompressedImage::within_budget` and decide whether to drop the image.

use super::format::{detect_format, image_dimensions, DetectedFormat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

/// Outputs at or under this share of the budget count as compliant
pub const BUDGET_MARGIN: f64 = 0.95;

/// Resize/re-encode attempts before the emergency pass
const MAX_ATTEMPTS: usize = 7;

/// Linear scale multiplier between attempts
const SCALE_STEP: f64 = 0.75;

/// Initial scale bias when the input is within 2x of the budget
const SCALE_BIAS: f64 = 0.75;

/// Initial scale bias when the input exceeds 2x the budget
const AGGRESSIVE_SCALE_BIAS: f64 = 0.6;

const QUALITY_START: u8 = 85;
const QUALITY_STEP: u8 = 15;
const QUALITY_FLOOR: u8 = 40;

/// Above this size a lossless encoding is abandoned for JPEG
const LOSSY_THRESHOLD_BYTES: usize = 1024 * 1024;

const EMERGENCY_SCALE_CAP: f64 = 0.4;
const EMERGENCY_MIN_WIDTH: u32 = 800;
const EMERGENCY_MIN_HEIGHT: u32 = 600;
const EMERGENCY_QUALITY: u8 = 30;

/// Default per-image limit of the messages-style backend
pub const MESSAGES_API_IMAGE_LIMIT: usize = 5 * 1024 * 1024;

/// Budget used by the last-resort pass of `compress_for_target`
const FORCED_PASS_BUDGET: usize = 1024 * 1024;

/// Whole-procedure retries in `compress_for_target`
const TARGET_RETRIES: usize = 3;

/// Budget multiplier between `compress_for_target` retries
const TARGET_SHRINK: f64 = 0.7;

/// Errors raised by the compression engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// The image could not be decoded, measured, or re-encoded
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
}

/// Byte and dimension budget an image must be reduced to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionTarget {
    /// Size the output must not exceed
    pub max_bytes: usize,
    /// Width below which shrinking is refused
    pub min_width: u32,
    /// Height below which shrinking is refused
    pub min_height: u32,
}

impl CompressionTarget {
    /// Budget with no dimension floor
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            min_width: 1,
            min_height: 1,
        }
    }

    /// Set the dimension floor
    pub fn with_min_dimensions(mut self, min_width: u32, min_height: u32) -> Self {
        self.min_width = min_width;
        self.min_height = min_height;
        self
    }

    /// Size attempts aim for, leaving a margin under `max_bytes`
    pub fn effective_budget(&self) -> usize {
        (self.max_bytes as f64 * BUDGET_MARGIN) as usize
    }
}

/// Output of a compression call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes` (may differ from the input's)
    pub mime_type: String,
    /// Output pixel dimensions; `None` when the input was passed through
    pub dimensions: Option<(u32, u32)>,
    /// Whether `bytes` fits the requested budget
    pub within_budget: bool,
}

impl CompressedImage {
    fn passthrough(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mime_type: mime_type.to_string(),
            dimensions: None,
            within_budget: true,
        }
    }

    /// Whether the engine returned the input untouched
    pub fn is_passthrough(&self) -> bool {
        self.dimensions.is_none()
    }
}

/// Synchronous compression engine
///
/// Calls are CPU bound; async callers should run them on a blocking worker.
#[derive(Debug, Clone, Copy)]
pub struct ImageCompressor {
    consumer_target: CompressionTarget,
    forced_target: CompressionTarget,
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self {
            consumer_target: CompressionTarget::new(MESSAGES_API_IMAGE_LIMIT)
                .with_min_dimensions(EMERGENCY_MIN_WIDTH, EMERGENCY_MIN_HEIGHT),
            forced_target: CompressionTarget::new(FORCED_PASS_BUDGET)
                .with_min_dimensions(EMERGENCY_MIN_WIDTH, EMERGENCY_MIN_HEIGHT),
        }
    }
}

impl ImageCompressor {
    /// Create an engine with the messages-style backend as its consumer target
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the target used by `compress_for_target`
    pub fn with_consumer_target(mut self, target: CompressionTarget) -> Self {
        self.consumer_target = target;
        self
    }

    /// Override the budget of the last-resort pass
    pub fn with_forced_target(mut self, target: CompressionTarget) -> Self {
        self.forced_target = target;
        self
    }

    /// Target used by `compress_for_target`
    pub fn consumer_target(&self) -> CompressionTarget {
        self.consumer_target
    }

    /// Shrink an encoded image below `target.max_bytes`
    ///
    /// Inputs already within budget are returned unchanged. The output may be
    /// over budget when the dimension floor stops further shrinking.
    pub fn compress(
        &self,
        image: &[u8],
        mime_type: &str,
        target: CompressionTarget,
    ) -> Result<CompressedImage, CompressionError> {
        if image.len() <= target.max_bytes {
            return Ok(CompressedImage::passthrough(image, mime_type));
        }

        let original = image_dimensions(image)?;
        let decoded = image::load_from_memory(image).map_err(|e| {
            CompressionError::CompressionFailed(format!("failed to decode image: {}", e))
        })?;

        let budget = target.effective_budget();
        let mut scale = initial_scale(image.len(), target.max_bytes);
        let mut quality = QUALITY_START;
        let mut lossy = detect_format(image).is_lossy() || image.len() > LOSSY_THRESHOLD_BYTES;

        debug!(
            "Compressing {}x{} image of {} bytes to {} bytes (initial scale {:.3})",
            original.0,
            original.1,
            image.len(),
            budget,
            scale
        );

        for attempt in 1..=MAX_ATTEMPTS {
            let dimensions = scaled_dimensions(
                original,
                scale,
                (target.min_width, target.min_height),
            );
            let mut encoded = encode(&decoded, dimensions, lossy, quality)?;

            if !lossy && encoded.bytes.len() > LOSSY_THRESHOLD_BYTES {
                lossy = true;
                encoded = encode(&decoded, dimensions, lossy, quality)?;
            }

            debug!(
                "Attempt {}: {}x{} quality {} -> {} bytes",
                attempt,
                dimensions.0,
                dimensions.1,
                quality,
                encoded.bytes.len()
            );

            if encoded.bytes.len() <= budget {
                return Ok(encoded.into_compressed(true));
            }

            scale *= SCALE_STEP;
            quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
        }

        let dimensions = scaled_dimensions(
            original,
            scale.min(EMERGENCY_SCALE_CAP),
            (
                target.min_width.max(EMERGENCY_MIN_WIDTH),
                target.min_height.max(EMERGENCY_MIN_HEIGHT),
            ),
        );
        let encoded = encode(&decoded, dimensions, true, EMERGENCY_QUALITY)?;
        let within_budget = encoded.bytes.len() <= target.max_bytes;
        if !within_budget {
            warn!(
                "Emergency pass left image at {} bytes, over the {} byte budget",
                encoded.bytes.len(),
                target.max_bytes
            );
        }

        Ok(encoded.into_compressed(within_budget))
    }

    /// Compress against the consumer target, tightening it when needed
    ///
    /// Retries the whole procedure with the target shrunk by 0.7 each time,
    /// then runs one last pass at the forced budget. `within_budget` is
    /// judged against the consumer target's `max_bytes`.
    pub fn compress_for_target(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<CompressedImage, CompressionError> {
        let limit = self.consumer_target.max_bytes;
        let mut target = self.consumer_target;
        let mut result = self.compress(image, mime_type, target)?;

        for retry in 1..=TARGET_RETRIES {
            if result.bytes.len() <= limit {
                break;
            }
            target.max_bytes = (target.max_bytes as f64 * TARGET_SHRINK) as usize;
            debug!(
                "Retry {} of {}: result {} bytes over limit {}, retrying at {}",
                retry,
                TARGET_RETRIES,
                result.bytes.len(),
                limit,
                target.max_bytes
            );
            result = self.compress(image, mime_type, target)?;
        }

        if result.bytes.len() > limit {
            debug!("Running forced pass at {} bytes", self.forced_target.max_bytes);
            result = self.compress(image, mime_type, self.forced_target)?;
        }

        result.within_budget = result.bytes.len() <= limit;
        Ok(result)
    }

    /// Bring one image under the consumer target
    ///
    /// Returns the bytes and MIME type to send, or `None` when the image
    /// cannot be made to fit and should be dropped.
    pub fn fit(&self, bytes: Vec<u8>, mime_type: String) -> Option<(Vec<u8>, String)> {
        let limit = self.consumer_target.max_bytes;
        if bytes.len() <= limit {
            return Some((bytes, mime_type));
        }

        match self.compress_for_target(&bytes, &mime_type) {
            Ok(compressed) if compressed.within_budget => {
                debug!(
                    "Compressed image from {} to {} bytes",
                    bytes.len(),
                    compressed.bytes.len()
                );
                Some((compressed.bytes, compressed.mime_type))
            }
            Ok(compressed) => {
                warn!(
                    "Dropping image still at {} bytes after compression (limit {})",
                    compressed.bytes.len(),
                    limit
                );
                None
            }
            Err(e) => {
                warn!("Dropping image that could not be compressed: {}", e);
                None
            }
        }
    }

    /// Re-encode any decodable image as JPEG at its original size
    pub fn transcode_to_jpeg(&self, image: &[u8]) -> Result<CompressedImage, CompressionError> {
        let decoded = image::load_from_memory(image).map_err(|e| {
            CompressionError::CompressionFailed(format!("failed to decode image: {}", e))
        })?;
        let dimensions = (decoded.width(), decoded.height());
        let encoded = encode(&decoded, dimensions, true, QUALITY_START)?;
        Ok(encoded.into_compressed(true))
    }
}

/// Initial linear scale from the byte ratio, never above 1.0
fn initial_scale(len: usize, max_bytes: usize) -> f64 {
    let ratio = (max_bytes as f64 / len as f64).sqrt();
    let bias = if len > max_bytes.saturating_mul(2) {
        AGGRESSIVE_SCALE_BIAS
    } else {
        SCALE_BIAS
    };
    (ratio * bias).min(1.0)
}

/// Aspect-preserving dimensions for `scale`, clamped to the floor and to the original
fn scaled_dimensions(original: (u32, u32), scale: f64, floor: (u32, u32)) -> (u32, u32) {
    let (width, height) = original;
    let floor_scale = (floor.0 as f64 / width as f64).max(floor.1 as f64 / height as f64);
    let scale = scale.max(floor_scale).min(1.0);

    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, width);
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, height);
    (scaled_width, scaled_height)
}

struct Encoded {
    bytes: Vec<u8>,
    mime_type: &'static str,
    dimensions: (u32, u32),
}

impl Encoded {
    fn into_compressed(self, within_budget: bool) -> CompressedImage {
        CompressedImage {
            bytes: self.bytes,
            mime_type: self.mime_type.to_string(),
            dimensions: Some(self.dimensions),
            within_budget,
        }
    }
}

fn encode(
    image: &DynamicImage,
    dimensions: (u32, u32),
    lossy: bool,
    quality: u8,
) -> Result<Encoded, CompressionError> {
    let resized;
    let source = if dimensions == (image.width(), image.height()) {
        image
    } else {
        resized = image.resize_exact(dimensions.0, dimensions.1, FilterType::Triangle);
        &resized
    };

    let mut bytes = Vec::new();
    let mime_type = if lossy {
        let rgb = flatten_alpha(source);
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&rgb)
            .map_err(|e| CompressionError::CompressionFailed(format!("JPEG encode: {}", e)))?;
        "image/jpeg"
    } else {
        source
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CompressionError::CompressionFailed(format!("PNG encode: {}", e)))?;
        "image/png"
    };

    Ok(Encoded {
        bytes,
        mime_type,
        dimensions,
    })
}

/// Composite onto white; JPEG has no alpha channel
fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
