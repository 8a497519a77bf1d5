//! Report construction helpers for the lookup_report crate.

use std::path::{Path, PathBuf};

use image::{DynamicImage, Luma};
use log::{debug, info};
use qrcode::QrCode;

use crate::compose::Composer;
use crate::config::ReportConfig;
use crate::fonts::FontSet;
use crate::model::ReportContent;
use crate::surface::pdf::PdfSurface;
use crate::surface::raster::RasterSurface;
use crate::surface::{OutputFormat, RenderError};

/// Anything able to turn report content into artifact bytes.
pub trait RenderReport {
    fn render(
        &self,
        content: &ReportContent<'_>,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError>;
}

enum CodeImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Link(String),
}

/// Encodes `link` as a QR code at least `size_px` pixels wide.
fn qr_code_image(link: &str, size_px: u32) -> Result<DynamicImage, RenderError> {
    let code = QrCode::new(link.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(size_px, size_px)
        .build();
    Ok(DynamicImage::ImageLuma8(image))
}

/// Builder for [`ReportRenderer`] instances pre-configured with the crate defaults.
#[derive(Default)]
pub struct ReportBuilder {
    config: Option<ReportConfig>,
    fonts: Option<FontSet>,
    code_image: Option<CodeImageSource>,
}

impl ReportBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default layout configuration.
    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `fonts` instead of discovering the default family on disk.
    pub fn with_fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Loads the footer code image from `path`, overriding `footer.code_image`.
    pub fn with_code_image_path(mut self, path: impl AsRef<Path>) -> Self {
        self.code_image = Some(CodeImageSource::Path(path.as_ref().to_path_buf()));
        self
    }

    /// Decodes the footer code image from encoded bytes.
    pub fn with_code_image_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.code_image = Some(CodeImageSource::Bytes(bytes.into()));
        self
    }

    /// Generates the footer QR code from `link`, overriding the configured code.
    pub fn with_code_link(mut self, link: impl Into<String>) -> Self {
        self.code_image = Some(CodeImageSource::Link(link.into()));
        self
    }

    /// Validates the configuration and loads fonts and images.
    ///
    /// Missing fonts are fatal: without real metrics the layout would be wrong.
    pub fn build(self) -> Result<ReportRenderer, RenderError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let fonts = match self.fonts {
            Some(fonts) => fonts,
            None => FontSet::load_default().map_err(RenderError::Fonts)?,
        };
        debug!("report fonts: {}", fonts.family_name);

        let footer = &config.footer;
        let source = self
            .code_image
            .or_else(|| footer.code_image.clone().map(CodeImageSource::Path))
            .or_else(|| footer.code_link.clone().map(CodeImageSource::Link));
        let code_image = match source {
            Some(CodeImageSource::Path(path)) => {
                info!("loading footer code image from {}", path.display());
                Some(image::open(&path)?)
            }
            Some(CodeImageSource::Bytes(bytes)) => Some(image::load_from_memory(&bytes)?),
            Some(CodeImageSource::Link(link)) if link.trim().is_empty() => None,
            Some(CodeImageSource::Link(link)) => {
                debug!("encoding footer QR code for {}", link);
                let size_px = (footer.code_size * config.raster.scale).ceil() as u32;
                Some(qr_code_image(link.trim(), size_px)?)
            }
            None => None,
        };

        Ok(ReportRenderer {
            config,
            fonts,
            code_image,
        })
    }
}

/// Renders reports with a fixed configuration, font family and code image.
pub struct ReportRenderer {
    config: ReportConfig,
    fonts: FontSet,
    code_image: Option<DynamicImage>,
}

impl ReportRenderer {
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    fn composer(&self) -> Composer<'_> {
        Composer::new(&self.config, self.code_image.as_ref())
    }
}

impl RenderReport for ReportRenderer {
    fn render(
        &self,
        content: &ReportContent<'_>,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError> {
        let paginated = format.is_paginated();
        let bytes = match format {
            OutputFormat::Pdf => {
                let title = format!("{} {}", content.report_type.title(), content.subject);
                let surface = PdfSurface::new(&self.fonts, title)?;
                self.composer().render(content, paginated, surface)?
            }
            OutputFormat::Png => {
                let surface = RasterSurface::new(&self.fonts, &self.config.raster)?;
                self.composer().render(content, paginated, surface)?
            }
        };
        info!(
            "rendered {} {} for {} ({} bytes)",
            content.report_type,
            format,
            content.subject,
            bytes.len()
        );
        Ok(bytes)
    }
}
