//! Contract for the generative backend that produces subject masks and edited images.

use image::RgbaImage;
use thiserror::Error;

use crate::raster::{MimeType, RasterVersion};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend request failed: {message}")]
    Request { message: String },
    #[error("backend returned a malformed response: {message}")]
    MalformedResponse { message: String },
    #[error("backend quota exceeded; wait a moment before trying again")]
    QuotaExceeded,
    #[error("backend worker exited without a response")]
    WorkerLost,
}

impl BackendError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// "Select subject" request: the raster currently shown and its encoding.
#[derive(Debug, Clone)]
pub struct MaskRequest {
    pub image: RasterVersion,
    pub mime_type: MimeType,
}

/// Edit request. `mask`, when present, is strictly black/white and matches
/// the image dimensions; white marks the region the edit is confined to.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub image: RasterVersion,
    pub mime_type: MimeType,
    pub prompt: String,
    pub mask: Option<RgbaImage>,
}

impl EditRequest {
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct EditedImage {
    pub image: RgbaImage,
    pub mime_type: MimeType,
}

impl EditedImage {
    pub fn new(image: RgbaImage, mime_type: MimeType) -> Self {
        Self { image, mime_type }
    }

    /// Decodes encoded bytes returned by a remote service.
    pub fn from_bytes(bytes: &[u8], mime_type: MimeType) -> BackendResult<Self> {
        let version = RasterVersion::from_bytes(bytes, mime_type)
            .map_err(|err| BackendError::malformed(err.to_string()))?;
        Ok(Self {
            mime_type: version.mime_type().clone(),
            image: version.pixels().clone(),
        })
    }
}

/// Implemented by the collaborator that talks to the generative model.
/// Calls run on a worker thread and may block for as long as they need.
pub trait EditBackend: Send + Sync {
    /// Returns a mask of the request image's size: white subject, black elsewhere.
    fn request_subject_mask(&self, request: &MaskRequest) -> BackendResult<RgbaImage>;

    fn request_edited_image(&self, request: &EditRequest) -> BackendResult<EditedImage>;
}
