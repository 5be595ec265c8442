//! Per-session binary selection painted by freehand strokes or imported from
//! the subject-mask backend.
//!
//! Coverage is stored as a `GrayImage` holding only `0` or `255`. The magenta
//! tint shown while painting is derived from it in [`MaskSurface::overlay`];
//! the backend only ever sees the black/white export.

mod stroke;

use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};

use crate::geometry::{ImageBounds, ToolPoint};

pub use stroke::{PenStroke, PenWidth};

const SELECTED: u8 = 255;
const UNSELECTED: u8 = 0;
const IMPORT_THRESHOLD: u16 = 128;

pub const OVERLAY_TINT: Rgba<u8> = Rgba([255, 0, 255, 179]);
pub const EXPORT_SELECTED: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const EXPORT_UNSELECTED: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone)]
pub struct MaskSurface {
    coverage: GrayImage,
    has_selection: bool,
    active_stroke: Option<PenStroke>,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            coverage: GrayImage::new(width, height),
            has_selection: false,
            active_stroke: None,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.coverage.dimensions()
    }

    fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.coverage.width(), self.coverage.height())
    }

    /// Reallocates for a raster of a new size. Always leaves the mask empty.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.coverage.dimensions() == (width, height) {
            self.clear();
            return;
        }
        tracing::debug!(width, height, "mask surface reallocated");
        *self = Self::new(width, height);
    }

    pub fn has_selection(&self) -> bool {
        self.has_selection
    }

    pub fn is_stroking(&self) -> bool {
        self.active_stroke.is_some()
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.coverage
            .get_pixel_checked(x, y)
            .is_some_and(|pixel| pixel.0[0] == SELECTED)
    }

    pub fn selected_pixel_count(&self) -> usize {
        self.coverage
            .pixels()
            .filter(|pixel| pixel.0[0] == SELECTED)
            .count()
    }

    pub fn begin_stroke(&mut self, point: ToolPoint, width: PenWidth) {
        if self.active_stroke.is_some() {
            self.end_stroke();
        }
        self.stamp_segment(point, point, width.radius());
        self.active_stroke = Some(PenStroke::new(point, width));
    }

    pub fn extend_stroke(&mut self, point: ToolPoint) {
        let Some((from, width)) = self
            .active_stroke
            .as_ref()
            .map(|stroke| (stroke.last_point(), stroke.width))
        else {
            return;
        };
        self.stamp_segment(from, point, width.radius());
        if let Some(stroke) = self.active_stroke.as_mut() {
            stroke.append_point(point);
        }
    }

    /// Finishes the active stroke; the mask counts as selected from here on.
    pub fn end_stroke(&mut self) -> Option<PenStroke> {
        let mut stroke = self.active_stroke.take()?;
        stroke.finalize();
        self.has_selection = true;
        tracing::debug!(points = stroke.points.len(), "mask stroke finished");
        Some(stroke)
    }

    /// Replaces the whole surface with `mask`, scaled to fill the surface.
    pub fn import_mask(&mut self, mask: &RgbaImage) {
        let (width, height) = self.coverage.dimensions();
        self.active_stroke = None;
        if mask.width() == 0 || mask.height() == 0 || width == 0 || height == 0 {
            self.coverage = GrayImage::new(width, height);
            self.has_selection = true;
            return;
        }

        let scaled;
        let source = if mask.dimensions() == (width, height) {
            mask
        } else {
            scaled = imageops::resize(mask, width, height, imageops::FilterType::Triangle);
            &scaled
        };

        for (target, pixel) in self.coverage.pixels_mut().zip(source.pixels()) {
            *target = Luma([if is_mask_white(pixel) {
                SELECTED
            } else {
                UNSELECTED
            }]);
        }
        self.has_selection = true;
        tracing::debug!(
            selected = self.selected_pixel_count(),
            "subject mask imported"
        );
    }

    /// Resets to fully unselected. Returns whether anything was selected.
    pub fn clear(&mut self) -> bool {
        let had_content = self.has_selection || self.active_stroke.is_some();
        self.active_stroke = None;
        self.has_selection = false;
        if had_content {
            self.coverage.pixels_mut().for_each(|pixel| *pixel = Luma([UNSELECTED]));
        }
        had_content
    }

    /// Binary mask for the edit backend: selected pixels white, all others black.
    pub fn export_for_backend(&self) -> RgbaImage {
        let (width, height) = self.coverage.dimensions();
        RgbaImage::from_fn(width, height, |x, y| {
            if self.coverage.get_pixel(x, y).0[0] == SELECTED {
                EXPORT_SELECTED
            } else {
                EXPORT_UNSELECTED
            }
        })
    }

    /// Translucent display layer drawn over the raster while painting.
    pub fn overlay(&self) -> RgbaImage {
        let (width, height) = self.coverage.dimensions();
        RgbaImage::from_fn(width, height, |x, y| {
            if self.coverage.get_pixel(x, y).0[0] == SELECTED {
                OVERLAY_TINT
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    fn stamp_segment(&mut self, from: ToolPoint, to: ToolPoint, radius: f32) {
        let bounds = self.bounds();
        if bounds.width == 0 || bounds.height == 0 {
            return;
        }
        let reach = radius.ceil() as i64 + 1;
        let min_x = (i64::from(from.x.min(to.x)) - reach).max(0);
        let min_y = (i64::from(from.y.min(to.y)) - reach).max(0);
        let max_x = (i64::from(from.x.max(to.x)) + reach).min(i64::from(bounds.width) - 1);
        let max_y = (i64::from(from.y.max(to.y)) + reach).min(i64::from(bounds.height) - 1);

        let (ax, ay) = (from.x as f32, from.y as f32);
        let (bx, by) = (to.x as f32, to.y as f32);
        let radius_sq = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if !bounds.contains(x, y) {
                    continue;
                }
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                if distance_sq_to_segment(px, py, ax, ay, bx, by) <= radius_sq {
                    self.coverage.put_pixel(x as u32, y as u32, Luma([SELECTED]));
                }
            }
        }
    }
}

fn is_mask_white(pixel: &Rgba<u8>) -> bool {
    let [r, g, b, a] = pixel.0;
    let luma = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
    luma >= u32::from(IMPORT_THRESHOLD) && u16::from(a) >= IMPORT_THRESHOLD
}

fn distance_sq_to_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx) * (px - cx) + (py - cy) * (py - cy)
}
