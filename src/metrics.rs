//! Font selection and text measurement.
//!
//! Layout never measures text on its own: every width comes from a [`TextMeasure`]
//! implementation provided by the output backend, so the numbers used to size a block are the
//! numbers the backend will draw with.

use serde::Deserialize;

/// Face of the report font family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
    Italic,
}

/// Face and size (in points) of a text run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct FontSpec {
    pub size: u8,
    #[serde(default)]
    pub weight: FontWeight,
}

impl FontSpec {
    pub const fn regular(size: u8) -> Self {
        Self {
            size,
            weight: FontWeight::Regular,
        }
    }

    pub const fn bold(size: u8) -> Self {
        Self {
            size,
            weight: FontWeight::Bold,
        }
    }

    pub const fn italic(size: u8) -> Self {
        Self {
            size,
            weight: FontWeight::Italic,
        }
    }
}

/// Measures the advance width of text, in points.
///
/// Implementations must be pure functions of their font data: the same text and font always
/// yield the same width, regardless of what was measured before.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: FontSpec) -> f64;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        (**self).text_width(text, font)
    }
}

/// Metrics that assign every character the same advance.
///
/// They need no font files, which makes them handy for previews and tests; they are not used by
/// the PDF or PNG backends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedMetrics {
    /// Advance of one character as a fraction of the font size.
    pub advance: f64,
    /// Extra factor applied to bold text.
    pub bold_factor: f64,
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self {
            advance: 0.5,
            bold_factor: 1.1,
        }
    }
}

impl TextMeasure for FixedMetrics {
    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        let factor = match font.weight {
            FontWeight::Bold => self.bold_factor,
            FontWeight::Regular | FontWeight::Italic => 1.0,
        };
        text.chars().count() as f64 * f64::from(font.size) * self.advance * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_metrics_scale_with_size_and_weight() {
        let metrics = FixedMetrics::default();
        assert_eq!(metrics.text_width("abcd", FontSpec::regular(10)), 20.0);
        assert_eq!(metrics.text_width("", FontSpec::regular(10)), 0.0);
        assert!(
            metrics.text_width("abcd", FontSpec::bold(10))
                > metrics.text_width("abcd", FontSpec::regular(10))
        );
    }

    #[test]
    fn font_spec_deserializes_with_default_weight() {
        let spec: FontSpec = toml::from_str("size = 9").expect("valid font spec");
        assert_eq!(spec, FontSpec::regular(9));
        let spec: FontSpec = toml::from_str("size = 7\nweight = \"italic\"").expect("valid");
        assert_eq!(spec, FontSpec::italic(7));
    }
}
