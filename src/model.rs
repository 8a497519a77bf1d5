//! Data structures describing the logical content of a report.
//!
//! Nothing in here depends on a rendering backend: records come straight from the upstream
//! lookup, the [`ReportType`] descriptor decides which fields end up in which slot, and the
//! geometry types ([`Rect`], [`LayoutBox`]) are plain values in PDF points with the origin at the
//! top-left corner of a page and `y` growing downwards.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder rendered for fields that are missing, blank or not representable as text.
pub const PLACEHOLDER: &str = "N/A";

/// An RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let hex = input.strip_prefix('#').unwrap_or(input);
        if hex.len() != 6 {
            return Err(ColorParseError::new(
                input,
                "expected 6 hexadecimal digits, e.g. `#1e88e5`",
            ));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::new(
                input,
                "invalid RGB specification; use hexadecimal digits only",
            ));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| ColorParseError::new(input, "invalid hexadecimal channel"))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw).map_err(de::Error::custom)
    }
}

/// Error produced by [`Color::from_hex`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorParseError {
    input: String,
    message: &'static str,
}

impl ColorParseError {
    fn new(input: &str, message: &'static str) -> Self {
        Self {
            input: input.to_owned(),
            message,
        }
    }
}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (got `{}`)", self.message, self.input)
    }
}

impl std::error::Error for ColorParseError {}

/// Axis-aligned rectangle in points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// One upstream data item.
///
/// The schema depends on the report type and is never validated up front: any JSON value is
/// accepted, and non-object values simply behave like a record without fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns the textual value of `name`, or `None` when the field is missing, blank or not a
    /// scalar.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(if *flag { "Yes" } else { "No" }.to_owned()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the first available value among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.field(name))
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Record::from)
    }
}

/// A labelled detail slot of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetailField {
    pub label: &'static str,
    /// Candidate record keys, tried in order.
    pub keys: &'static [&'static str],
    /// Prefix printed in front of present values (currency symbols and the like).
    pub unit: Option<&'static str>,
}

impl DetailField {
    const fn new(label: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            label,
            keys,
            unit: None,
        }
    }

    const fn money(label: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            label,
            keys,
            unit: Some("S/"),
        }
    }

    fn render(&self, record: &Record) -> String {
        match (record.first_field(self.keys), self.unit) {
            (Some(value), Some(unit)) => format!("{}: {} {}", self.label, unit, value),
            (Some(value), None) => format!("{}: {}", self.label, value),
            (None, _) => format!("{}: {}", self.label, PLACEHOLDER),
        }
    }
}

/// Field mapping and theme of one report type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMap {
    pub label: &'static str,
    pub accent: Color,
    pub title_keys: &'static [&'static str],
    pub details: &'static [DetailField],
}

const SALARY: FieldMap = FieldMap {
    label: "Salaries",
    accent: Color::rgb(46, 125, 50),
    title_keys: &["empresa", "razonSocial"],
    details: &[
        DetailField::money("Salary", &["sueldo", "monto"]),
        DetailField::new("Period", &["periodo"]),
        DetailField::new("Status", &["situacion"]),
    ],
};

const CONSUMPTION: FieldMap = FieldMap {
    label: "Consumptions",
    accent: Color::rgb(21, 101, 192),
    title_keys: &["razonSocial", "empresa"],
    details: &[
        DetailField::money("Amount", &["monto"]),
        DetailField::new("Date", &["fecha"]),
        DetailField::new("RUC", &["numRucEmisor", "ruc"]),
    ],
};

const EMPLOYMENT: FieldMap = FieldMap {
    label: "Employment",
    accent: Color::rgb(230, 126, 34),
    title_keys: &["empresa", "razonSocial"],
    details: &[
        DetailField::new("RUC", &["ruc", "numRuc"]),
        DetailField::new("Position", &["cargo"]),
        DetailField::new("Start", &["fechaInicio", "fechaIngreso"]),
        DetailField::new("End", &["fechaFin", "fechaCese"]),
    ],
};

const COMPANY: FieldMap = FieldMap {
    label: "Companies",
    accent: Color::rgb(106, 27, 154),
    title_keys: &["razonSocial", "nombre"],
    details: &[
        DetailField::new("RUC", &["ruc", "numRuc"]),
        DetailField::new("Status", &["estado"]),
        DetailField::new("Condition", &["condicion"]),
        DetailField::new("Address", &["direccion"]),
    ],
};

/// Kind of lookup being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Salary,
    Consumption,
    Employment,
    Company,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Salary,
        ReportType::Consumption,
        ReportType::Employment,
        ReportType::Company,
    ];

    pub fn field_map(self) -> &'static FieldMap {
        match self {
            ReportType::Salary => &SALARY,
            ReportType::Consumption => &CONSUMPTION,
            ReportType::Employment => &EMPLOYMENT,
            ReportType::Company => &COMPANY,
        }
    }

    /// Heading printed at the top of the first page.
    pub fn title(self) -> &'static str {
        match self {
            ReportType::Salary => "Salary Report",
            ReportType::Consumption => "Consumption Report",
            ReportType::Employment => "Employment Report",
            ReportType::Company => "Company Report",
        }
    }

    /// Prefix of published artifact names.
    pub fn file_prefix(self) -> &'static str {
        match self {
            ReportType::Salary => "SALARY",
            ReportType::Consumption => "CONSUMPTION",
            ReportType::Employment => "EMPLOYMENT",
            ReportType::Company => "COMPANY",
        }
    }

    /// Path segment of the upstream lookup endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            ReportType::Salary => "sueldos",
            ReportType::Consumption => "consumos",
            ReportType::Employment => "trabajos",
            ReportType::Company => "empresas",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            ReportType::Salary => "salary",
            ReportType::Consumption => "consumption",
            ReportType::Employment => "employment",
            ReportType::Company => "company",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ReportType::ALL
            .into_iter()
            .find(|kind| kind.keyword() == wanted || kind.endpoint() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown report type '{}'; expected one of salary, consumption, employment, company",
                    s
                )
            })
    }
}

/// Title, accent and detail lines of one record, before any measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextBlock {
    pub title: String,
    pub accent: Color,
    pub details: Vec<String>,
}

impl TextBlock {
    /// Derives the block for `record`. Detail order follows the report type's field map.
    pub fn from_record(record: &Record, report_type: ReportType) -> Self {
        let map = report_type.field_map();
        Self {
            title: record
                .first_field(map.title_keys)
                .unwrap_or_else(|| PLACEHOLDER.to_owned()),
            accent: map.accent,
            details: map.details.iter().map(|field| field.render(record)).collect(),
        }
    }

    /// Initial shown inside the avatar square.
    pub fn initial(&self) -> String {
        self.title
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_owned())
    }
}

/// A positioned and measured block for one record.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutBox {
    /// Position of the record in the input sequence.
    pub index: usize,
    pub rect: Rect,
    pub block: TextBlock,
    pub title_lines: Vec<String>,
    pub detail_lines: Vec<Vec<String>>,
}

impl LayoutBox {
    pub fn line_count(&self) -> usize {
        self.title_lines.len() + self.detail_lines.iter().map(Vec::len).sum::<usize>()
    }
}

/// Everything the composer needs to know about one report.
#[derive(Clone, Copy, Debug)]
pub struct ReportContent<'a> {
    pub subject: &'a str,
    pub report_type: ReportType,
    pub generated_on: NaiveDate,
    /// Match count reported upstream; may differ from `records.len()` when a cap was applied.
    pub quantity: u64,
    pub records: &'a [Record],
}
