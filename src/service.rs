//! Request handling: fetch records, render and publish the report, shape the response.

use std::fmt;

use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use crate::builder::RenderReport;
use crate::model::{ReportContent, ReportType};
use crate::publish::{PublicationGate, PublishError};
use crate::source::{RecordSource, SourceError};
use crate::store::ArtifactStore;
use crate::surface::OutputFormat;

const MAX_SUBJECT_LEN: usize = 32;

/// One report request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    pub subject: String,
    pub report_type: ReportType,
    pub format: OutputFormat,
    pub generated_on: NaiveDate,
}

impl ReportRequest {
    pub fn new(
        subject: impl Into<String>,
        report_type: ReportType,
        format: OutputFormat,
        generated_on: NaiveDate,
    ) -> Self {
        Self {
            subject: subject.into(),
            report_type,
            format,
            generated_on,
        }
    }
}

/// Successful response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FoundResponse {
    pub message: &'static str,
    pub result: FoundResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FoundResult {
    pub quantity: u64,
    pub url: String,
    /// `true` when the artifact was already published and nothing was rendered.
    pub cached: bool,
}

/// Failure response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub message: &'static str,
    pub detail: String,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            message: "error",
            detail: err.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ServiceError {
    InvalidSubject(String),
    NoData,
    Source(SourceError),
    Publish(PublishError),
}

impl ServiceError {
    /// HTTP-style status code for the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSubject(_) => 400,
            Self::NoData => 404,
            Self::Source(_) => 502,
            Self::Publish(_) => 500,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSubject(reason) => write!(f, "Invalid subject id: {reason}"),
            Self::NoData => write!(f, "No records found"),
            Self::Source(err) => write!(f, "{err}"),
            Self::Publish(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Publish(err) => Some(err),
            Self::InvalidSubject(_) | Self::NoData => None,
        }
    }
}

impl From<SourceError> for ServiceError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<PublishError> for ServiceError {
    fn from(err: PublishError) -> Self {
        Self::Publish(err)
    }
}

/// Checks the subject id and returns it trimmed.
pub fn validate_subject(subject: &str) -> Result<&str, ServiceError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ServiceError::InvalidSubject("subject id is required".into()));
    }
    if subject.len() > MAX_SUBJECT_LEN {
        return Err(ServiceError::InvalidSubject(format!(
            "subject id is longer than {} characters",
            MAX_SUBJECT_LEN
        )));
    }
    if let Some(ch) = subject
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-'))
    {
        return Err(ServiceError::InvalidSubject(format!(
            "unexpected character '{}'",
            ch
        )));
    }
    Ok(subject)
}

/// Glue between a record source, a renderer and an artifact store.
pub struct ReportService<Src, St, R> {
    source: Src,
    store: St,
    renderer: R,
    max_records: Option<usize>,
}

impl<Src, St, R> ReportService<Src, St, R>
where
    Src: RecordSource,
    St: ArtifactStore,
    R: RenderReport,
{
    pub fn new(source: Src, store: St, renderer: R) -> Self {
        Self {
            source,
            store,
            renderer,
            max_records: None,
        }
    }

    /// Caps the number of records drawn into one report.
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn handle(&self, request: &ReportRequest) -> Result<FoundResponse, ServiceError> {
        let subject = validate_subject(&request.subject)?;
        let result = self.source.lookup(subject, request.report_type)?;
        if result.is_empty() {
            info!("no {} records for {}", request.report_type, subject);
            return Err(ServiceError::NoData);
        }

        let records = match self.max_records {
            Some(cap) if cap < result.coincidences.len() => {
                warn!(
                    "{} {} records for {}; drawing the first {}",
                    result.coincidences.len(),
                    request.report_type,
                    subject,
                    cap
                );
                &result.coincidences[..cap]
            }
            _ => &result.coincidences[..],
        };

        let content = ReportContent {
            subject,
            report_type: request.report_type,
            generated_on: request.generated_on,
            quantity: result.quantity,
            records,
        };

        let gate = PublicationGate::new(&self.store);
        let publication = gate.publish(subject, request.report_type, request.format, || {
            self.renderer.render(&content, request.format)
        })?;

        Ok(FoundResponse {
            message: "found data",
            result: FoundResult {
                quantity: result.quantity,
                url: publication.url,
                cached: !publication.is_new,
            },
        })
    }

    /// Handles `request` and returns the status code with the JSON body to send back.
    pub fn respond(&self, request: &ReportRequest) -> (u16, serde_json::Value) {
        match self.handle(request) {
            Ok(found) => (200, serde_json::to_value(found).unwrap_or_default()),
            Err(err) => {
                warn!("report request failed: {}", err);
                let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap_or_default();
                (err.status_code(), body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use crate::publish::tests::MemoryStore;
    use crate::source::LookupResult;
    use crate::surface::RenderError;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    struct StubSource {
        result: LookupResult,
        calls: Cell<usize>,
    }

    impl StubSource {
        fn with_records(quantity: u64, count: usize) -> Self {
            let coincidences = (0..count)
                .map(|n| Record::from(json!({ "empresa": format!("EMPRESA {n}"), "sueldo": 100 })))
                .collect();
            Self {
                result: LookupResult {
                    quantity,
                    coincidences,
                },
                calls: Cell::new(0),
            }
        }
    }

    impl RecordSource for StubSource {
        fn lookup(&self, _subject: &str, _kind: ReportType) -> Result<LookupResult, SourceError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.result.clone())
        }
    }

    #[derive(Default)]
    struct StubRenderer {
        rendered: RefCell<Vec<usize>>,
    }

    impl RenderReport for StubRenderer {
        fn render(
            &self,
            content: &ReportContent<'_>,
            _format: OutputFormat,
        ) -> Result<Vec<u8>, RenderError> {
            self.rendered.borrow_mut().push(content.records.len());
            Ok(vec![1, 2, 3])
        }
    }

    fn request(subject: &str) -> ReportRequest {
        ReportRequest::new(
            subject,
            ReportType::Salary,
            OutputFormat::Pdf,
            NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
        )
    }

    #[test]
    fn subject_validation() {
        assert_eq!(validate_subject(" 12345678 ").expect("valid"), "12345678");
        assert!(validate_subject("   ").is_err());
        assert!(validate_subject("12/34").is_err());
        assert!(validate_subject(&"9".repeat(33)).is_err());
    }

    #[test]
    fn invalid_subject_is_rejected_before_any_work() {
        let source = StubSource::with_records(1, 1);
        let service = ReportService::new(&source, MemoryStore::default(), StubRenderer::default());
        let err = service.handle(&request("")).expect_err("blank subject");
        assert_eq!(err.status_code(), 400);
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn zero_matches_is_no_data() {
        let service = ReportService::new(
            StubSource::with_records(0, 0),
            MemoryStore::default(),
            StubRenderer::default(),
        );
        let (status, body) = service.respond(&request("123"));
        assert_eq!(status, 404);
        assert_eq!(body["message"], "error");
        assert_eq!(body["detail"], "No records found");
    }

    #[test]
    fn second_identical_request_is_served_from_the_store() {
        let service = ReportService::new(
            StubSource::with_records(2, 2),
            MemoryStore::default(),
            StubRenderer::default(),
        );

        let first = service.handle(&request("123")).expect("first");
        let second = service.handle(&request("123")).expect("second");

        assert_eq!(first.message, "found data");
        assert!(!first.result.cached);
        assert!(second.result.cached);
        assert_eq!(first.result.url, "mem://SALARY_123.pdf");
        assert_eq!(first.result.url, second.result.url);
        assert_eq!(service.renderer.rendered.borrow().len(), 1);
    }

    #[test]
    fn record_cap_limits_drawn_blocks_but_not_quantity() {
        let service = ReportService::new(
            StubSource::with_records(120, 120),
            MemoryStore::default(),
            StubRenderer::default(),
        )
        .with_max_records(Some(50));

        let (status, body) = service.respond(&request("42"));
        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({
                "message": "found data",
                "result": { "quantity": 120, "url": "mem://SALARY_42.pdf", "cached": false }
            })
        );
        assert_eq!(*service.renderer.rendered.borrow(), vec![50]);
    }

    #[test]
    fn upload_failure_becomes_an_error_response() {
        let store = MemoryStore::default();
        store.fail_upload.set(true);
        let service = ReportService::new(StubSource::with_records(1, 1), store, StubRenderer::default());
        let (status, body) = service.respond(&request("7"));
        assert_eq!(status, 500);
        assert_eq!(body["message"], "error");
    }
}
