//! PNG backend: a single RGBA canvas rasterised with `rusttype`.
//!
//! Every `begin_page` call appends its height to the bottom of the canvas, so a document plan
//! made of several pages still ends up as one image.

use image::{imageops, DynamicImage, ImageOutputFormat, Pixel, Rgba, RgbaImage};
use log::debug;
use rusttype::{point, Font, Scale};

use crate::config::RasterConfig;
use crate::fonts::FontSet;
use crate::metrics::{FontSpec, FontWeight, TextMeasure};
use crate::model::{Color, Rect};

use super::{RenderError, Surface};

struct Faces {
    regular: Font<'static>,
    bold: Font<'static>,
    italic: Font<'static>,
}

impl Faces {
    fn load(fonts: &FontSet) -> Result<Self, RenderError> {
        let parse = |bytes: &Vec<u8>, style: &str| {
            Font::try_from_vec(bytes.clone()).ok_or_else(|| {
                RenderError::Fonts(genpdf::error::Error::new(
                    format!("Failed to parse {} {} font", fonts.family_name, style),
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid font data"),
                ))
            })
        };
        Ok(Self {
            regular: parse(&fonts.regular, "regular")?,
            bold: parse(&fonts.bold, "bold")?,
            italic: parse(&fonts.italic, "italic")?,
        })
    }

    fn get(&self, weight: FontWeight) -> &Font<'static> {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
            FontWeight::Italic => &self.italic,
        }
    }
}

/// Rusttype scale for an em size of `size` units.
///
/// `Scale::uniform` sizes the ascent-to-descent height, so it is corrected by the font's own
/// proportions to match the em-based sizes used by the PDF backend.
fn em_scale(font: &Font<'_>, size: f32) -> Scale {
    let metrics = font.v_metrics_unscaled();
    let units = f32::from(font.units_per_em().max(1));
    Scale::uniform(size * (metrics.ascent - metrics.descent) / units)
}

fn line_width(font: &Font<'_>, text: &str, scale: Scale) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

fn rgba(color: Color, alpha: u8) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, alpha])
}

/// Pixel height of a canvas reaching `bottom` points, refused above `limit` pixels.
fn canvas_height(bottom: f64, scale: f64, limit: u32) -> Result<u32, RenderError> {
    let height = (bottom * scale).round().max(1.0);
    if height > f64::from(limit) {
        return Err(RenderError::CanvasTooLarge {
            height: height.min(f64::from(u32::MAX)) as u32,
            limit,
        });
    }
    Ok(height as u32)
}

/// Single-canvas surface producing a PNG image.
pub struct RasterSurface {
    faces: Faces,
    scale: f64,
    background: Color,
    max_height: u32,
    canvas: Option<RgbaImage>,
    /// Top of the current page on the canvas, in points.
    offset: f64,
    next_offset: f64,
}

impl RasterSurface {
    pub fn new(fonts: &FontSet, config: &RasterConfig) -> Result<Self, RenderError> {
        Ok(Self {
            faces: Faces::load(fonts)?,
            scale: config.scale,
            background: config.background,
            max_height: config.max_height,
            canvas: None,
            offset: 0.0,
            next_offset: 0.0,
        })
    }

    fn px(&self, value: f64) -> i64 {
        (value * self.scale).round() as i64
    }

    fn canvas_mut(&mut self) -> Result<&mut RgbaImage, RenderError> {
        self.canvas.as_mut().ok_or(RenderError::NoPage)
    }

    /// Pixel bounds of `rect` on the current page, clamped to the canvas.
    fn pixel_bounds(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let canvas = self.canvas.as_ref()?;
        let clamp = |value: i64, max: u32| value.clamp(0, i64::from(max)) as u32;
        let left = clamp(self.px(rect.x), canvas.width());
        let top = clamp(self.px(rect.y + self.offset), canvas.height());
        let right = clamp(self.px(rect.right()), canvas.width());
        let bottom = clamp(self.px(rect.bottom() + self.offset), canvas.height());
        (right > left && bottom > top).then_some((left, top, right, bottom))
    }
}

impl TextMeasure for RasterSurface {
    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        let face = self.faces.get(font.weight);
        f64::from(line_width(face, text, em_scale(face, f32::from(font.size))))
    }
}

impl Surface for RasterSurface {
    fn begin_page(&mut self, width: f64, height: f64) -> Result<(), RenderError> {
        let width_px = self.px(width).max(1) as u32;
        let top = self.next_offset;
        let total_px = canvas_height(top + height, self.scale, self.max_height)?;
        let background = rgba(self.background, 255);

        let mut canvas = RgbaImage::from_pixel(width_px, total_px, background);
        if let Some(previous) = self.canvas.take() {
            imageops::replace(&mut canvas, &previous, 0, 0);
        }
        self.canvas = Some(canvas);
        self.offset = top;
        self.next_offset = top + height;
        debug!(
            "raster canvas extended to {}x{}px",
            width_px, total_px
        );
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        let bounds = self.pixel_bounds(rect);
        let canvas = self.canvas_mut()?;
        if let Some((left, top, right, bottom)) = bounds {
            let pixel = rgba(color, 255);
            for y in top..bottom {
                for x in left..right {
                    canvas.put_pixel(x, y, pixel);
                }
            }
        }
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        let bounds = self.pixel_bounds(rect);
        let canvas = self.canvas_mut()?;
        if let Some((left, top, right, bottom)) = bounds {
            let pixel = rgba(color, 255);
            for x in left..right {
                canvas.put_pixel(x, top, pixel);
                canvas.put_pixel(x, bottom - 1, pixel);
            }
            for y in top..bottom {
                canvas.put_pixel(left, y, pixel);
                canvas.put_pixel(right - 1, y, pixel);
            }
        }
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: FontSpec,
        color: Color,
    ) -> Result<(), RenderError> {
        let origin_x = (x * self.scale) as f32;
        let top = ((y + self.offset) * self.scale) as f32;
        let pixel_scale = self.scale as f32;
        let canvas = self.canvas.as_mut().ok_or(RenderError::NoPage)?;
        let face = self.faces.get(font.weight);
        let scale = em_scale(face, f32::from(font.size) * pixel_scale);
        let baseline = top + face.v_metrics(scale).ascent;
        let (width, height) = canvas.dimensions();

        for glyph in face.layout(text, scale, point(origin_x, baseline)) {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bounds.min.x + gx as i32;
                let py = bounds.min.y + gy as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                canvas
                    .get_pixel_mut(px as u32, py as u32)
                    .blend(&rgba(color, alpha));
            });
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &DynamicImage, rect: Rect) -> Result<(), RenderError> {
        let bounds = self.pixel_bounds(rect);
        let canvas = self.canvas_mut()?;
        if let Some((left, top, right, bottom)) = bounds {
            let resized = imageops::resize(
                image,
                right - left,
                bottom - top,
                imageops::FilterType::Triangle,
            );
            imageops::overlay(canvas, &resized, left, top);
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        let canvas = self.canvas.ok_or(RenderError::NoPage)?;
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(canvas).write_to(&mut bytes, ImageOutputFormat::Png)?;
        Ok(bytes)
    }
}
