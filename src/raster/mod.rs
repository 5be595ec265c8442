//! Immutable raster versions and their encodings.

use std::fmt;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;

const DATA_URL_PREFIX: &str = "data:";
const DATA_URL_BASE64_MARKER: &str = ";base64";

static NEXT_VERSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to decode {mime_type} image: {source}")]
    Decode {
        mime_type: MimeType,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode image as {mime_type}: {source}")]
    Encode {
        mime_type: MimeType,
        #[source]
        source: image::ImageError,
    },
    #[error("not a base64 data url")]
    InvalidDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image has zero width or height")]
    EmptyImage,
}

pub type RasterResult<T> = std::result::Result<T, RasterError>;

/// MIME-style encoding tag carried next to every raster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType(String);

impl MimeType {
    pub const PNG: &'static str = "image/png";
    pub const JPEG: &'static str = "image/jpeg";
    pub const WEBP: &'static str = "image/webp";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_ascii_lowercase())
    }

    pub fn png() -> Self {
        Self::new(Self::PNG)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn image_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(&self.0)
    }

    fn from_format(format: ImageFormat) -> Self {
        Self::new(format.to_mime_type())
    }
}

impl Default for MimeType {
    fn default() -> Self {
        Self::png()
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fully rendered state of the edited image. Cloning shares the pixels.
#[derive(Debug, Clone)]
pub struct RasterVersion {
    id: u64,
    pixels: Arc<RgbaImage>,
    mime_type: MimeType,
}

impl RasterVersion {
    pub fn new(pixels: RgbaImage, mime_type: MimeType) -> Self {
        Self {
            id: NEXT_VERSION_ID.fetch_add(1, Ordering::Relaxed),
            pixels: Arc::new(pixels),
            mime_type,
        }
    }

    /// Decodes encoded bytes. The tag is only a hint; the payload is sniffed when it disagrees.
    pub fn from_bytes(bytes: &[u8], mime_type: MimeType) -> RasterResult<Self> {
        let (decoded, mime_type) = match mime_type.image_format() {
            Some(format) if image::guess_format(bytes).ok() == Some(format) => (
                image::load_from_memory_with_format(bytes, format),
                mime_type,
            ),
            _ => {
                let sniffed = image::guess_format(bytes)
                    .map(MimeType::from_format)
                    .unwrap_or(mime_type);
                (image::load_from_memory(bytes), sniffed)
            }
        };
        let pixels = decoded
            .map_err(|source| RasterError::Decode {
                mime_type: mime_type.clone(),
                source,
            })?
            .to_rgba8();
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(RasterError::EmptyImage);
        }
        Ok(Self::new(pixels, mime_type))
    }

    /// Accepts the `data:<mime>;base64,<payload>` form produced by the page pipeline.
    pub fn from_data_url(url: &str) -> RasterResult<Self> {
        let (mime_type, bytes) = parse_data_url(url)?;
        Self::from_bytes(&bytes, mime_type)
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn shared_pixels(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.pixels)
    }

    pub fn mime_type(&self) -> &MimeType {
        &self.mime_type
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Encodes the pixels in this version's own format, falling back to PNG for unknown tags.
    pub fn encode(&self) -> RasterResult<Vec<u8>> {
        let format = self.mime_type.image_format().unwrap_or(ImageFormat::Png);
        encode_rgba(&self.pixels, format)
    }

    pub fn same_pixels(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels) || *self.pixels == *other.pixels
    }
}

pub(crate) fn encode_rgba(pixels: &RgbaImage, format: ImageFormat) -> RasterResult<Vec<u8>> {
    let image = match format {
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pixels.clone()).to_rgb8())
        }
        _ => DynamicImage::ImageRgba8(pixels.clone()),
    };
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|source| RasterError::Encode {
            mime_type: MimeType::from_format(format),
            source,
        })?;
    Ok(buffer)
}

pub(crate) fn parse_data_url(url: &str) -> RasterResult<(MimeType, Vec<u8>)> {
    let rest = url
        .trim()
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(RasterError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(RasterError::InvalidDataUrl)?;
    let mime = header
        .strip_suffix(DATA_URL_BASE64_MARKER)
        .ok_or(RasterError::InvalidDataUrl)?;
    let bytes = STANDARD.decode(payload.trim())?;
    Ok((MimeType::new(mime), bytes))
}

pub(crate) fn format_data_url(mime_type: &MimeType, bytes: &[u8]) -> String {
    format!(
        "{DATA_URL_PREFIX}{mime_type}{DATA_URL_BASE64_MARKER},{}",
        STANDARD.encode(bytes)
    )
}
