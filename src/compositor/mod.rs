//! Flattening of the current raster with its annotation layer.
//!
//! Every function here is pure: the output depends only on the raster
//! version, the annotation set and the font passed in.

use image::{ImageFormat, RgbaImage};

use crate::annotation::{over, AnnotationSet, BubbleFont};
use crate::mask::MaskSurface;
use crate::raster::{encode_rgba, format_data_url, MimeType, RasterResult, RasterVersion};

/// The single image handed to the session sink on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub mime_type: MimeType,
    pub width: u32,
    pub height: u32,
}

impl ExportedImage {
    pub fn to_data_url(&self) -> String {
        format_data_url(&self.mime_type, &self.bytes)
    }
}

/// Base raster with the bubble layer drawn on top. The mask never contributes.
pub fn flatten(
    current: &RasterVersion,
    annotations: &AnnotationSet,
    font: Option<&BubbleFont>,
) -> RgbaImage {
    let mut output = current.pixels().clone();
    let (width, height) = output.dimensions();
    if annotations.is_empty() {
        return output;
    }
    let layer = annotations.render_layer(width, height, font);
    draw_layer(&mut output, &layer);
    output
}

/// Flattens and encodes as PNG.
pub fn export(
    current: &RasterVersion,
    annotations: &AnnotationSet,
    font: Option<&BubbleFont>,
) -> RasterResult<ExportedImage> {
    let flattened = flatten(current, annotations, font);
    let (width, height) = flattened.dimensions();
    let bytes = encode_rgba(&flattened, ImageFormat::Png)?;
    Ok(ExportedImage {
        bytes,
        mime_type: MimeType::png(),
        width,
        height,
    })
}

/// Interactive redraw: raster, then the translucent mask tint, then bubbles.
pub fn compose_preview(
    current: &RasterVersion,
    mask: &MaskSurface,
    annotations: &AnnotationSet,
    font: Option<&BubbleFont>,
) -> RgbaImage {
    let mut output = current.pixels().clone();
    let (width, height) = output.dimensions();
    if mask.has_selection() || mask.is_stroking() {
        if mask.dimensions() == (width, height) {
            draw_layer(&mut output, &mask.overlay());
        } else {
            tracing::warn!(
                mask = ?mask.dimensions(),
                raster = ?(width, height),
                "mask size differs from raster; overlay skipped"
            );
        }
    }
    if !annotations.is_empty() {
        draw_layer(&mut output, &annotations.render_layer(width, height, font));
    }
    output
}

fn draw_layer(target: &mut RgbaImage, layer: &RgbaImage) {
    for (dest, source) in target.pixels_mut().zip(layer.pixels()) {
        if source.0[3] == 0 {
            continue;
        }
        *dest = over(*dest, *source, 1.0);
    }
}
