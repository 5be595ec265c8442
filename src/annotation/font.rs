use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported or corrupt font data")]
    Invalid,
    #[error("{path} is not a usable font file")]
    InvalidFile { path: PathBuf },
    #[error("no sans-serif system font found: {reason}")]
    NoSystemFont { reason: String },
}

/// Typeface used for bubble text.
#[derive(Clone)]
pub struct BubbleFont {
    font: FontArc,
}

impl fmt::Debug for BubbleFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BubbleFont")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl BubbleFont {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontError> {
        let font = FontArc::try_from_vec(bytes).map_err(|_| FontError::Invalid)?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes).map_err(|_| FontError::InvalidFile {
            path: path.to_path_buf(),
        })
    }

    /// Loads the configured font, falling back to the system's best
    /// sans-serif match. When both fail the error for the configured path is
    /// returned, or the system lookup error when nothing was configured.
    pub fn resolve(configured: Option<&Path>) -> Result<Self, FontError> {
        let configured_error = match configured.map(Self::load) {
            Some(Ok(font)) => return Ok(font),
            Some(Err(err)) => {
                tracing::warn!(%err, "configured bubble font unusable; trying system fonts");
                Some(err)
            }
            None => None,
        };

        match Self::system_sans_serif() {
            Ok(font) => Ok(font),
            Err(err) => {
                let err = configured_error.unwrap_or(err);
                tracing::warn!(%err, "no font available; bubble text will not be rendered");
                Err(err)
            }
        }
    }

    pub fn system_sans_serif() -> Result<Self, FontError> {
        let handle = SystemSource::new()
            .select_best_match(&[FamilyName::SansSerif], &Properties::new())
            .map_err(|err| FontError::NoSystemFont {
                reason: err.to_string(),
            })?;
        let font = handle.load().map_err(|err| FontError::NoSystemFont {
            reason: err.to_string(),
        })?;
        let bytes = font
            .copy_font_data()
            .ok_or_else(|| FontError::NoSystemFont {
                reason: "font data unavailable".to_string(),
            })?;
        Self::from_bytes((*bytes).clone())
    }

    pub(crate) fn font(&self) -> &FontArc {
        &self.font
    }

    /// Horizontal advance of one line at `size` pixels, kerning included.
    pub fn line_width(&self, line: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0_f32;
        let mut previous = None;
        for ch in line.chars() {
            let glyph_id = self.font.glyph_id(ch);
            if let Some(previous) = previous {
                width += scaled.kern(previous, glyph_id);
            }
            width += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);
        }
        width
    }

    /// Offset from a line's vertical middle to its baseline.
    pub fn middle_to_baseline(&self, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        (scaled.ascent() + scaled.descent()) / 2.0
    }
}


#[cfg(test)]
pub(crate) fn test_font() -> BubbleFont {
    BubbleFont::from_bytes(include_bytes!("../../tests/fonts/DejaVuSans.ttf").to_vec())
        .expect("bundled test font parses")
}
