//! Upstream lookup service client.

use std::fmt;
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::model::{Record, ReportType};

/// Upstream response body: `{ "result": { "quantity": n, "coincidences": [...] } }`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LookupEnvelope {
    #[serde(default)]
    pub result: Option<LookupResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LookupResult {
    #[serde(default)]
    pub quantity: u64,
    #[serde(default, deserialize_with = "nullable_records")]
    pub coincidences: Vec<Record>,
}

fn nullable_records<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Record>>::deserialize(deserializer)?.unwrap_or_default())
}

impl LookupEnvelope {
    pub fn from_json_str(input: &str) -> Result<Self, SourceError> {
        serde_json::from_str(input).map_err(SourceError::Decode)
    }

    /// The lookup result, or an empty one when upstream sent none.
    pub fn into_result(self) -> LookupResult {
        self.result.unwrap_or_default()
    }
}

impl LookupResult {
    /// Whether this result counts as "no data".
    pub fn is_empty(&self) -> bool {
        self.quantity == 0 || self.coincidences.is_empty()
    }
}

/// Provider of lookup results.
pub trait RecordSource {
    fn lookup(&self, subject: &str, report_type: ReportType) -> Result<LookupResult, SourceError>;
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn lookup(&self, subject: &str, report_type: ReportType) -> Result<LookupResult, SourceError> {
        (**self).lookup(subject, report_type)
    }
}

#[derive(Debug)]
pub enum SourceError {
    Http(reqwest::Error),
    Decode(serde_json::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "Lookup request failed: {err}"),
            Self::Decode(err) => write!(f, "Lookup response could not be decoded: {err}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Decode(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

pub const DEFAULT_SOURCE_URL: &str = "https://banckend-poxyv1-cosultape-masitaprex.fly.dev";
pub const SOURCE_URL_ENV: &str = "LOOKUP_REPORT_SOURCE_URL";

/// Record source querying `{base_url}/{endpoint}?dni={subject}`.
pub struct HttpRecordSource {
    client: Client,
    base_url: String,
}

impl HttpRecordSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Sends requests through `client`, e.g. one with custom proxy or TLS settings.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint_url(&self, report_type: ReportType) -> String {
        format!("{}/{}", self.base_url, report_type.endpoint())
    }
}

impl RecordSource for HttpRecordSource {
    fn lookup(&self, subject: &str, report_type: ReportType) -> Result<LookupResult, SourceError> {
        let url = self.endpoint_url(report_type);
        debug!("fetching {} records for {} from {}", report_type, subject, url);
        let body = self
            .client
            .get(&url)
            .query(&[("dni", subject)])
            .send()?
            .error_for_status()?
            .text()?;
        Ok(LookupEnvelope::from_json_str(&body)?.into_result())
    }
}
