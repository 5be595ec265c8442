use ab_glyph::{point, Font, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use super::bubble::{Bubble, BubbleShape};
use super::font::BubbleFont;
use crate::geometry::Color;

pub const BUBBLE_CORNER_RADIUS: f32 = 10.0;
pub const BUBBLE_BORDER_WIDTH: f32 = 2.0;
pub const BUBBLE_FONT_SIZE: f32 = 16.0;
pub const BUBBLE_LINE_HEIGHT: f32 = 16.0;

pub(crate) fn draw_bubble(target: &mut RgbaImage, bubble: &Bubble, font: Option<&BubbleFont>) {
    draw_bubble_shape(target, bubble);
    if let Some(font) = font {
        draw_bubble_text(target, bubble, font);
    }
}

fn draw_bubble_shape(target: &mut RgbaImage, bubble: &Bubble) {
    if bubble.width == 0 || bubble.height == 0 {
        return;
    }
    let (cx, cy) = bubble.bounds().center();
    let half_w = bubble.width as f32 / 2.0;
    let half_h = bubble.height as f32 / 2.0;
    let half_border = BUBBLE_BORDER_WIDTH / 2.0;

    let reach = half_border + 1.0;
    let min_x = ((cx - half_w - reach).floor() as i64).max(0);
    let min_y = ((cy - half_h - reach).floor() as i64).max(0);
    let max_x = ((cx + half_w + reach).ceil() as i64).min(i64::from(target.width()) - 1);
    let max_y = ((cy + half_h + reach).ceil() as i64).min(i64::from(target.height()) - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5 - cx;
            let py = y as f32 + 0.5 - cy;
            let distance = match bubble.shape {
                BubbleShape::Rounded => rounded_rect_distance(px, py, half_w, half_h),
                BubbleShape::Ellipse => ellipse_distance(px, py, half_w, half_h),
            };
            let fill = (0.5 - distance).clamp(0.0, 1.0);
            let border = (half_border + 0.5 - distance.abs()).clamp(0.0, 1.0);
            let (x, y) = (x as u32, y as u32);
            blend_pixel(target, x, y, bubble.background_color, fill);
            blend_pixel(target, x, y, bubble.border_color, border);
        }
    }
}

fn draw_bubble_text(target: &mut RgbaImage, bubble: &Bubble, font: &BubbleFont) {
    let lines = bubble.lines();
    let (cx, cy) = bubble.bounds().center();
    let scale = PxScale::from(BUBBLE_FONT_SIZE);
    let baseline_offset = font.middle_to_baseline(BUBBLE_FONT_SIZE);
    let first_middle = cy - (lines.len() as f32 - 1.0) * BUBBLE_LINE_HEIGHT / 2.0;
    let (width, height) = target.dimensions();

    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let baseline = first_middle + index as f32 * BUBBLE_LINE_HEIGHT + baseline_offset;
        let mut caret = cx - font.line_width(line, BUBBLE_FONT_SIZE) / 2.0;
        let scaled = font.font().as_scaled(scale);
        let mut previous = None;

        for ch in line.chars() {
            let glyph_id = font.font().glyph_id(ch);
            if let Some(previous) = previous {
                caret += scaled.kern(previous, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(glyph_id);
            previous = Some(glyph_id);

            let Some(outlined) = font.font().outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + i64::from(gx);
                let y = bounds.min.y as i64 + i64::from(gy);
                if x >= 0 && y >= 0 && x < i64::from(width) && y < i64::from(height) {
                    blend_pixel(target, x as u32, y as u32, bubble.text_color, coverage);
                }
            });
        }
    }
}

/// Signed distance to a rounded rectangle centered on the origin; negative inside.
fn rounded_rect_distance(px: f32, py: f32, half_w: f32, half_h: f32) -> f32 {
    let radius = BUBBLE_CORNER_RADIUS.min(half_w).min(half_h);
    let qx = px.abs() - (half_w - radius);
    let qy = py.abs() - (half_h - radius);
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0) - radius
}

/// Approximate signed distance to an axis-aligned ellipse centered on the origin.
fn ellipse_distance(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let k0 = ((px / rx).powi(2) + (py / ry).powi(2)).sqrt();
    let k1 = ((px / (rx * rx)).powi(2) + (py / (ry * ry)).powi(2)).sqrt();
    if k1 <= f32::EPSILON {
        return -rx.min(ry);
    }
    k0 * (k0 - 1.0) / k1
}

/// Source-over blend of an opaque color at partial coverage onto straight-alpha pixels.
pub(crate) fn blend_pixel(target: &mut RgbaImage, x: u32, y: u32, color: Color, coverage: f32) {
    let alpha = coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let pixel = target.get_pixel_mut(x, y);
    if alpha >= 1.0 {
        *pixel = Rgba(color.to_rgba(255));
        return;
    }
    *pixel = over(*pixel, Rgba(color.to_rgba(255)), alpha);
}

/// Composites `source` (its own alpha scaled by `opacity`) over `dest`.
pub(crate) fn over(dest: Rgba<u8>, source: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let src_a = f32::from(source.0[3]) / 255.0 * opacity.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return dest;
    }
    let dst_a = f32::from(dest.0[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |index: usize| {
        let src = f32::from(source.0[index]);
        let dst = f32::from(dest.0[index]);
        let value = (src * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
