//! Turns a [`Layout`] into pixels.
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};

use super::avatar::fit;
use super::font::Typeface;
use super::layout::{DrawOp, Layout};
use crate::Result;

pub fn rasterize(
    layout: &Layout,
    avatar: Option<&RgbaImage>,
    typeface: &Typeface,
) -> RgbaImage {
    let mut canvas = RgbaImage::new(layout.width, layout.height);
    for op in &layout.ops {
        match op {
            DrawOp::Fill(color) => {
                for pixel in canvas.pixels_mut() {
                    *pixel = *color;
                }
            }
            DrawOp::VerticalGradient { top, bottom } => {
                vertical_gradient(&mut canvas, *top, *bottom)
            }
            DrawOp::Glow {
                cx,
                cy,
                radius,
                spread,
                color,
            } => glow(&mut canvas, *cx, *cy, *radius, *spread, *color),
            DrawOp::Disc {
                cx,
                cy,
                radius,
                color,
            } => shade_circle(&mut canvas, *cx, *cy, *radius, |d| {
                Some((*color, edge(*radius - d)))
            }),
            DrawOp::Ring {
                cx,
                cy,
                radius,
                width,
                color,
            } => {
                let inner = radius - width;
                shade_circle(&mut canvas, *cx, *cy, *radius, |d| {
                    Some((*color, edge(*radius - d) * edge(d - inner)))
                })
            }
            DrawOp::Avatar { cx, cy, radius } => {
                if let Some(avatar) = avatar {
                    draw_avatar(&mut canvas, avatar, *cx, *cy, *radius);
                }
            }
            DrawOp::Text {
                text,
                cx,
                top,
                size,
                spacing,
                color,
            } => {
                let width = typeface.measure(text, *size, *spacing);
                let left = cx - width / 2.0;
                let mut plot = |x, y, coverage| {
                    blend(&mut canvas, x, y, *color, coverage)
                };
                typeface.draw(text, left, *top, *size, *spacing, &mut plot);
            }
        }
    }
    canvas
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Source-over compositing of `color` at the given coverage.
fn blend(
    canvas: &mut RgbaImage,
    x: i64,
    y: i64,
    color: Rgba<u8>,
    coverage: f32,
) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    if x < 0 || y < 0 || x >= width || y >= height {
        return;
    }
    let alpha = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let mixed = color[channel] as f32 * alpha
            + dst[channel] as f32 * (1.0 - alpha);
        dst[channel] = mixed.round() as u8;
    }
    let out_alpha = alpha + (dst[3] as f32 / 255.0) * (1.0 - alpha);
    dst[3] = (out_alpha * 255.0).round() as u8;
}

/// Anti-aliased coverage of a boundary at signed distance `d`.
fn edge(d: f32) -> f32 {
    (d + 0.5).clamp(0.0, 1.0)
}

fn vertical_gradient(
    canvas: &mut RgbaImage,
    top: Rgba<u8>,
    bottom: Rgba<u8>,
) {
    let height = canvas.height().max(2) - 1;
    for (_, y, pixel) in canvas.enumerate_pixels_mut() {
        let t = y as f32 / height as f32;
        let mut color = top;
        for channel in 0..4 {
            let (from, to) = (top[channel] as f32, bottom[channel] as f32);
            color[channel] = (from + (to - from) * t).round() as u8;
        }
        *pixel = color;
    }
}

/// Visits every pixel within `reach` of the centre and blends whatever
/// `shade` returns for its distance.
fn shade_circle<F>(
    canvas: &mut RgbaImage,
    cx: f32,
    cy: f32,
    reach: f32,
    mut shade: F,
) where
    F: FnMut(f32) -> Option<(Rgba<u8>, f32)>,
{
    let x0 = (cx - reach - 1.0).floor() as i64;
    let x1 = (cx + reach + 1.0).ceil() as i64;
    let y0 = (cy - reach - 1.0).floor() as i64;
    let y1 = (cy + reach + 1.0).ceil() as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if let Some((color, coverage)) = shade(d) {
                blend(canvas, x, y, color, coverage);
            }
        }
    }
}

fn glow(
    canvas: &mut RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    spread: f32,
    color: Rgba<u8>,
) {
    shade_circle(canvas, cx, cy, radius + spread, |d| {
        if d < radius - 1.0 || spread <= 0.0 {
            return None;
        }
        let t = ((d - radius) / spread).clamp(0.0, 1.0);
        let falloff = (1.0 - t) * (1.0 - t);
        Some((color, falloff * edge(d - radius)))
    });
}

fn draw_avatar(
    canvas: &mut RgbaImage,
    avatar: &RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
) {
    let diameter = (radius * 2.0).round() as u32;
    let fitted = fit(avatar, diameter);
    let left = (cx - radius).round() as i64;
    let top = (cy - radius).round() as i64;
    for (ax, ay, pixel) in fitted.enumerate_pixels() {
        let dx = ax as f32 + 0.5 - radius;
        let dy = ay as f32 + 0.5 - radius;
        let coverage = edge(radius - (dx * dx + dy * dy).sqrt());
        if coverage > 0.0 {
            let (x, y) = (left + ax as i64, top + ay as i64);
            blend(canvas, x, y, *pixel, coverage);
        }
    }
}
