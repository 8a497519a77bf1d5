//! PDF backend drawing through `printpdf` with `genpdf` font metrics.
//!
//! The composer works in points from the top-left corner; printpdf works in millimetres from the
//! bottom-left corner. Every coordinate crosses the boundary through [`pt_to_mm`] and a flip
//! against the current page height.

use std::io::BufWriter;

use genpdf::fonts::FontCache;
use genpdf::style::Style;
use genpdf::Mm;
use log::debug;
use printpdf::{
    IndirectFontRef, Line, PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Rgb,
};

use crate::fonts::FontSet;
use crate::metrics::{FontSpec, FontWeight, TextMeasure};
use crate::model::{Color, Rect};

use super::{RenderError, Surface};

/// DPI handed to printpdf when placing images; scales are computed against it.
pub const DEFAULT_IMAGE_DPI: f64 = 300.0;

/// Outline width of stroked rectangles, in points.
const STROKE_WIDTH: f64 = 0.5;

const MM_PER_PT: f64 = 25.4 / 72.0;

fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn pt_to_mm(value: f64) -> printpdf::Mm {
    printpdf::Mm(value * MM_PER_PT)
}

/// Size an image occupies at `dpi` with a scale of 1, in millimetres.
fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> (f64, f64) {
    use image::GenericImageView;

    let (width, height) = image.dimensions();
    let to_mm = |px: u32| f64::from(px) * 25.4 / dpi;
    (to_mm(width), to_mm(height))
}

fn pdf_color(color: Color) -> printpdf::Color {
    let channel = |value: u8| f64::from(value) / 255.0;
    printpdf::Color::Rgb(Rgb::new(
        channel(color.r),
        channel(color.g),
        channel(color.b),
        None,
    ))
}

fn pdf_style(font: FontSpec) -> Style {
    let style = Style::new().with_font_size(font.size);
    match font.weight {
        FontWeight::Regular => style,
        FontWeight::Bold => style.bold(),
        FontWeight::Italic => style.italic(),
    }
}

/// Closed outline of `rect` on a page `page_height` points tall.
fn rect_outline(rect: Rect, page_height: f64) -> Line {
    let corner = |x: f64, y: f64| (Point::new(pt_to_mm(x), pt_to_mm(page_height - y)), false);
    Line {
        points: vec![
            corner(rect.x, rect.y),
            corner(rect.right(), rect.y),
            corner(rect.right(), rect.bottom()),
            corner(rect.x, rect.bottom()),
        ],
        is_closed: true,
        has_fill: false,
        has_stroke: false,
        is_clipping_path: false,
    }
}

/// Embedded faces, one per weight the composer asks for.
struct PdfFaces {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl PdfFaces {
    fn embed(doc: &PdfDocumentReference, fonts: &FontSet) -> Result<Self, RenderError> {
        Ok(Self {
            regular: doc.add_external_font(fonts.regular.as_slice())?,
            bold: doc.add_external_font(fonts.bold.as_slice())?,
            italic: doc.add_external_font(fonts.italic.as_slice())?,
        })
    }

    fn get(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
            FontWeight::Italic => &self.italic,
        }
    }
}

struct OpenDocument {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    page_height: f64,
    faces: PdfFaces,
}

/// Paginated surface producing a PDF document.
pub struct PdfSurface {
    title: String,
    fonts: FontSet,
    font_cache: FontCache,
    document: Option<OpenDocument>,
}

impl PdfSurface {
    pub fn new(fonts: &FontSet, title: impl Into<String>) -> Result<Self, RenderError> {
        let family = fonts.to_genpdf_family().map_err(RenderError::Fonts)?;
        Ok(Self {
            title: title.into(),
            fonts: fonts.clone(),
            font_cache: FontCache::new(family),
            document: None,
        })
    }

    fn document(&self) -> Result<&OpenDocument, RenderError> {
        self.document.as_ref().ok_or(RenderError::NoPage)
    }

    fn paint_rect(&self, rect: Rect, color: Color, fill: bool) -> Result<(), RenderError> {
        let document = self.document()?;
        let mut outline = rect_outline(rect, document.page_height);
        if fill {
            outline.has_fill = true;
            document.layer.set_fill_color(pdf_color(color));
        } else {
            outline.has_stroke = true;
            document.layer.set_outline_color(pdf_color(color));
            document.layer.set_outline_thickness(STROKE_WIDTH);
        }
        document.layer.add_shape(outline);
        Ok(())
    }
}

impl TextMeasure for PdfSurface {
    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        mm_to_f64(pdf_style(font).str_width(&self.font_cache, text)) / MM_PER_PT
    }
}

impl Surface for PdfSurface {
    fn begin_page(&mut self, width: f64, height: f64) -> Result<(), RenderError> {
        let (page_width, page_height) = (pt_to_mm(width), pt_to_mm(height));
        match self.document.as_mut() {
            Some(document) => {
                let (page, layer) = document.doc.add_page(page_width, page_height, "Layer 1");
                document.layer = document.doc.get_page(page).get_layer(layer);
                document.page_height = height;
            }
            None => {
                let (doc, page, layer) =
                    PdfDocument::new(self.title.as_str(), page_width, page_height, "Layer 1");
                let faces = PdfFaces::embed(&doc, &self.fonts)?;
                let layer = doc.get_page(page).get_layer(layer);
                self.document = Some(OpenDocument {
                    doc,
                    layer,
                    page_height: height,
                    faces,
                });
            }
        }
        debug!("started PDF page {}x{}pt", width, height);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.paint_rect(rect, color, true)
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.paint_rect(rect, color, false)
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: FontSpec,
        color: Color,
    ) -> Result<(), RenderError> {
        if text.is_empty() {
            return Ok(());
        }
        let document = self.document()?;
        let metrics = pdf_style(font).font(&self.font_cache);
        let glyph_height = mm_to_f64(metrics.glyph_height(font.size)) / MM_PER_PT;

        // Kerning comes back in 1/1000 em, opposite to the TJ adjustment direction.
        let positions = metrics
            .kerning(&self.font_cache, text.chars())
            .into_iter()
            .map(|kern| (kern * -1000.0) as i64);
        let glyphs = metrics.glyph_ids(&self.font_cache, text.chars());

        let layer = &document.layer;
        layer.begin_text_section();
        layer.set_fill_color(pdf_color(color));
        layer.set_font(document.faces.get(font.weight), f64::from(font.size));
        layer.set_text_cursor(
            pt_to_mm(x),
            pt_to_mm(document.page_height - y - glyph_height),
        );
        layer.write_positioned_codepoints(positions.zip(glyphs));
        layer.end_text_section();
        Ok(())
    }

    fn draw_image(&mut self, image: &image::DynamicImage, rect: Rect) -> Result<(), RenderError> {
        let document = self.document()?;
        let (natural_width, natural_height) = estimated_image_size(image, DEFAULT_IMAGE_DPI);
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return Ok(());
        }
        // printpdf anchors images at their bottom-left corner.
        printpdf::Image::from_dynamic_image(image).add_to_layer(
            document.layer.clone(),
            Some(pt_to_mm(rect.x)),
            Some(pt_to_mm(document.page_height - rect.bottom())),
            None,
            Some(rect.width * MM_PER_PT / natural_width),
            Some(rect.height * MM_PER_PT / natural_height),
            Some(DEFAULT_IMAGE_DPI),
        );
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        let document = self.document.ok_or(RenderError::NoPage)?;
        let mut buf = Vec::new();
        document.doc.save(&mut BufWriter::new(&mut buf))?;
        Ok(buf)
    }
}
