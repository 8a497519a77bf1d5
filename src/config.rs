//! Immutable layout configuration.
//!
//! Every dimension is in PDF points. A [`ReportConfig`] is built once (from defaults or a TOML
//! file) and then shared by reference with the layout engine, so different themes can be rendered
//! side by side without touching global state.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::metrics::FontSpec;
use crate::model::Color;

/// Page geometry of the paginated output; the canvas output reuses the width and margins.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// Where body content starts on continuation pages.
    pub continuation_top: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        // A4 portrait.
        Self {
            width: 595.0,
            height: 842.0,
            margin_left: 40.0,
            margin_right: 40.0,
            margin_top: 40.0,
            margin_bottom: 40.0,
            continuation_top: 56.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f64 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn right_edge(&self) -> f64 {
        self.width - self.margin_right
    }

    /// Lowest y a body box may reach on a page.
    pub fn body_bottom(&self) -> f64 {
        self.height - self.margin_bottom
    }
}

/// Geometry of a single record block.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockGeometry {
    pub avatar_size: f64,
    pub avatar_gap: f64,
    pub padding_x: f64,
    pub top_padding: f64,
    pub bottom_padding: f64,
    pub line_height: f64,
    pub min_height: f64,
    /// Vertical gap between consecutive blocks.
    pub spacing: f64,
}

impl Default for BlockGeometry {
    fn default() -> Self {
        Self {
            avatar_size: 22.0,
            avatar_gap: 8.0,
            padding_x: 8.0,
            top_padding: 7.0,
            bottom_padding: 7.0,
            line_height: 11.0,
            min_height: 36.0,
            spacing: 6.0,
        }
    }
}

/// Fonts used by the decorations and blocks.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontTheme {
    pub title: FontSpec,
    pub brand: FontSpec,
    pub subtitle: FontSpec,
    pub banner_label: FontSpec,
    pub banner_value: FontSpec,
    pub running_header: FontSpec,
    pub block_title: FontSpec,
    pub block_body: FontSpec,
    pub avatar: FontSpec,
    pub disclaimer: FontSpec,
    pub summary: FontSpec,
    pub caption: FontSpec,
}

impl Default for FontTheme {
    fn default() -> Self {
        Self {
            title: FontSpec::bold(22),
            brand: FontSpec::regular(10),
            subtitle: FontSpec::regular(9),
            banner_label: FontSpec::bold(10),
            banner_value: FontSpec::regular(10),
            running_header: FontSpec::regular(8),
            block_title: FontSpec::bold(9),
            block_body: FontSpec::regular(8),
            avatar: FontSpec::bold(11),
            disclaimer: FontSpec::italic(7),
            summary: FontSpec::bold(8),
            caption: FontSpec::bold(6),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub band: Color,
    pub stripe: Color,
    pub border: Color,
    pub avatar_text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: Color::BLACK,
            muted: Color::rgb(0x66, 0x66, 0x66),
            band: Color::rgb(0xf0, 0xf0, 0xf0),
            stripe: Color::rgb(0xf9, 0xf9, 0xf9),
            border: Color::rgb(0xcc, 0xcc, 0xcc),
            avatar_text: Color::WHITE,
        }
    }
}

/// Fixed-offset header and information banner of the first page.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderConfig {
    /// Label printed at the top right of the first page.
    pub brand_label: String,
    pub title_height: f64,
    pub subtitle_height: f64,
    pub band_height: f64,
    pub cell_height: f64,
    pub section_gap: f64,
    pub running_header_height: f64,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            brand_label: "Consulta pe apk".to_owned(),
            title_height: 30.0,
            subtitle_height: 16.0,
            band_height: 20.0,
            cell_height: 22.0,
            section_gap: 14.0,
            running_header_height: 24.0,
        }
    }
}

/// Download link of the companion app, encoded into the footer QR code by default.
pub const DEFAULT_CODE_LINK: &str = "https://apk.e-droid.net/apk/app3790080-1f9e8a.apk?v=2";

/// Disclaimer, totals and scannable code below the body.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FooterConfig {
    pub disclaimer: String,
    pub disclaimer_width: f64,
    pub line_height: f64,
    /// Gap between the last body block and the footer.
    pub gap_after_body: f64,
    /// Minimum space that must remain under the footer before the page edge.
    pub safety_margin: f64,
    /// PNG/JPEG file with a pre-rendered scannable code; takes precedence over `code_link`.
    pub code_image: Option<PathBuf>,
    /// Link encoded into a generated QR code. Set to an empty string to drop the code column.
    pub code_link: Option<String>,
    pub code_size: f64,
    pub code_caption: String,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            disclaimer: "Disclaimer: this document is provided for information purposes only. \
                         The data comes from external public sources. The application is not \
                         responsible for its accuracy or for keeping it up to date with the \
                         official entities."
                .to_owned(),
            disclaimer_width: 350.0,
            line_height: 9.0,
            gap_after_body: 24.0,
            safety_margin: 20.0,
            code_image: None,
            code_link: Some(DEFAULT_CODE_LINK.to_owned()),
            code_size: 70.0,
            code_caption: "SCAN TO DOWNLOAD APP".to_owned(),
        }
    }
}

/// Raster output settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterConfig {
    /// Pixels per point.
    pub scale: f64,
    pub background: Color,
    /// Tallest canvas the image output may allocate, in pixels.
    pub max_height: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: Color::WHITE,
            max_height: 32_000,
        }
    }
}

/// Complete, immutable configuration of the report engine.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub page: PageGeometry,
    pub block: BlockGeometry,
    pub fonts: FontTheme,
    pub palette: Palette,
    pub header: HeaderConfig,
    pub footer: FooterConfig,
    pub raster: RasterConfig,
    /// Upper bound on rendered records; applied before layout.
    pub max_records: Option<usize>,
}

impl ReportConfig {
    /// Parses a TOML document; omitted keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ReportConfig = toml::from_str(input).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Width left for wrapped block text after padding and the avatar column.
    pub fn block_text_width(&self) -> f64 {
        self.page.content_width()
            - 2.0 * self.block.padding_x
            - self.block.avatar_size
            - self.block.avatar_gap
    }

    /// Rejects geometry the engine cannot lay out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let page = &self.page;
        if page.width <= 0.0 || page.height <= 0.0 {
            return Err(ConfigError::Invalid("page size must be positive".into()));
        }
        if page.content_width() <= 0.0 {
            return Err(ConfigError::Invalid(
                "horizontal margins leave no content width".into(),
            ));
        }
        if self.block_text_width() <= 0.0 {
            return Err(ConfigError::Invalid(
                "block padding and avatar leave no room for text".into(),
            ));
        }
        if self.block.line_height <= 0.0 || self.footer.line_height <= 0.0 {
            return Err(ConfigError::Invalid("line heights must be positive".into()));
        }
        if page.continuation_top >= page.body_bottom() {
            return Err(ConfigError::Invalid(
                "continuation pages leave no room for body content".into(),
            ));
        }
        let block = &self.block;
        for (name, font) in [
            ("block_title", self.fonts.block_title),
            ("block_body", self.fonts.block_body),
        ] {
            if f64::from(font.size) > block.line_height {
                return Err(ConfigError::Invalid(format!(
                    "fonts.{} size {} exceeds block line height {}",
                    name, font.size, block.line_height
                )));
            }
        }
        if block.min_height < block.top_padding + block.avatar_size {
            return Err(ConfigError::Invalid(format!(
                "block min_height {} cannot hold the avatar ({} + {} top padding)",
                block.min_height, block.avatar_size, block.top_padding
            )));
        }
        if self.raster.scale <= 0.0 {
            return Err(ConfigError::Invalid("raster scale must be positive".into()));
        }
        if self.raster.max_height == 0 {
            return Err(ConfigError::Invalid("raster max_height must be positive".into()));
        }
        Ok(())
    }
}

/// Errors raised while loading a [`ReportConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => write!(f, "Failed to read config file {}", path.display()),
            Self::Parse(err) => write!(f, "Failed to parse config: {err}"),
            Self::Invalid(reason) => write!(f, "Invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
