//! Output backends.
//!
//! The composer only talks to the [`Surface`] trait: a small drawing vocabulary in points with a
//! top-left origin, plus the backend's own text metrics. [`pdf::PdfSurface`] produces one PDF page
//! per `begin_page` call, [`raster::RasterSurface`] keeps a single canvas and extends it instead.

pub mod pdf;
pub mod raster;

#[cfg(test)]
pub(crate) mod recording;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::metrics::{FontSpec, TextMeasure};
use crate::model::{Color, Rect};

/// Drawing capabilities required by the report composer.
pub trait Surface: TextMeasure {
    /// Starts a new page (paginated backends) or extends the canvas (single-canvas backends).
    fn begin_page(&mut self, width: f64, height: f64) -> Result<(), RenderError>;

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError>;

    fn stroke_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError>;

    /// Draws a single line of text whose line box starts at `(x, y)`.
    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: FontSpec,
        color: Color,
    ) -> Result<(), RenderError>;

    /// Draws `image` scaled into `rect`.
    fn draw_image(&mut self, image: &image::DynamicImage, rect: Rect) -> Result<(), RenderError>;

    /// Encodes everything drawn so far.
    fn finish(self) -> Result<Vec<u8>, RenderError>
    where
        Self: Sized;
}

/// Encoding of a published artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-page A4 document.
    #[default]
    Pdf,
    /// Single variable-height image.
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Png => "image/png",
        }
    }

    /// Whether body content is split across fixed-height pages.
    pub fn is_paginated(self) -> bool {
        matches!(self, OutputFormat::Pdf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "png" | "image" => Ok(OutputFormat::Png),
            other => Err(format!("unknown output format '{}'; expected pdf or png", other)),
        }
    }
}

/// Errors raised while rendering a report.
#[derive(Debug)]
pub enum RenderError {
    /// No usable font metrics could be loaded.
    Fonts(genpdf::error::Error),
    /// The PDF backend failed.
    Pdf(printpdf::Error),
    /// Decoding or encoding an image failed.
    Image(image::ImageError),
    /// The footer code could not be encoded.
    Code(qrcode::types::QrError),
    /// A drawing call was issued before the first page was started.
    NoPage,
    /// The single-canvas output would exceed its configured height.
    CanvasTooLarge { height: u32, limit: u32 },
    Config(ConfigError),
}

impl From<printpdf::Error> for RenderError {
    fn from(err: printpdf::Error) -> Self {
        Self::Pdf(err)
    }
}

impl From<qrcode::types::QrError> for RenderError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::Code(err)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fonts(err) => write!(f, "Font metrics unavailable: {err}"),
            Self::Pdf(err) => write!(f, "PDF rendering failed: {err}"),
            Self::Image(err) => write!(f, "Image processing failed: {err}"),
            Self::Code(err) => write!(f, "Footer code could not be encoded: {err}"),
            Self::NoPage => write!(f, "Drawing command issued before the first page"),
            Self::CanvasTooLarge { height, limit } => write!(
                f,
                "Image output would be {height}px tall, above the {limit}px limit"
            ),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fonts(err) => Some(err),
            Self::Pdf(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Code(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::NoPage | Self::CanvasTooLarge { .. } => None,
        }
    }
}
