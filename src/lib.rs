pub mod annotation;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod logging;
pub mod mask;
pub mod raster;
pub mod session;
pub mod state;
pub mod storage;

pub use error::{AppError, AppResult};
pub use session::{EditSession, SessionError, SessionResult};

use std::path::Path;

use annotation::{AnnotationSet, BubblePatch};
use compositor::ExportedImage;
use raster::{MimeType, RasterVersion};

/// Headless flatten: decodes `image`, lays out one bubble per patch and
/// returns the PNG export. Fails with [`AppError::Font`] when a bubble has
/// text but no font can be loaded.
pub fn flatten_with_bubbles(
    image: &[u8],
    mime_type: MimeType,
    bubbles: &[BubblePatch],
    config: &config::EditorConfig,
) -> AppResult<ExportedImage> {
    let base = RasterVersion::from_bytes(image, mime_type)?;
    let mut annotations = AnnotationSet::new();
    for patch in bubbles {
        let id = annotations.add();
        annotations.update(id, patch);
    }
    let has_text = annotations
        .bubbles()
        .iter()
        .any(|bubble| !bubble.text.trim().is_empty());
    let font = if has_text {
        Some(annotation::BubbleFont::resolve(config.font_path.as_deref())?)
    } else {
        None
    };
    tracing::info!(
        width = base.dimensions().0,
        height = base.dimensions().1,
        bubbles = annotations.len(),
        "flattening image"
    );
    Ok(compositor::export(&base, &annotations, font.as_ref())?)
}

/// Reads a JSON array of bubble patches.
pub fn parse_bubbles(json: &str) -> AppResult<Vec<BubblePatch>> {
    Ok(serde_json::from_str(json)?)
}

/// Guesses the encoding of an input file from its extension.
pub fn mime_type_for_path(path: &Path) -> MimeType {
    path.extension()
        .and_then(|ext| image::ImageFormat::from_extension(ext))
        .map(|format| MimeType::new(format.to_mime_type()))
        .unwrap_or_default()
}
