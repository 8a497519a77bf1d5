//! Idempotent publication of rendered reports.
//!
//! Every (subject, report type, format) triple maps to one artifact name. The gate checks the
//! store first and only renders when nothing is stored under that name yet.

use std::fmt;

use log::{debug, info, warn};

use crate::model::ReportType;
use crate::store::{ArtifactStore, StoreError};
use crate::surface::{OutputFormat, RenderError};

/// Deterministic artifact name, e.g. `SALARY_12345678.pdf`.
///
/// The subject is trimmed and uppercased; anything outside `A-Z`, `0-9` and `-` becomes `_`
/// so the name is safe as a path segment on every store.
pub fn artifact_name(subject: &str, report_type: ReportType, format: OutputFormat) -> String {
    let subject: String = subject
        .trim()
        .chars()
        .map(|ch| {
            let upper = ch.to_ascii_uppercase();
            if upper.is_ascii_uppercase() || upper.is_ascii_digit() || upper == '-' {
                upper
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}_{}.{}",
        report_type.file_prefix(),
        subject,
        format.extension()
    )
}

/// Result of a successful publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub url: String,
    /// `false` when the artifact already existed and nothing was rendered.
    pub is_new: bool,
}

#[derive(Debug)]
pub enum PublishError {
    Render(RenderError),
    Upload(StoreError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(err) => write!(f, "Rendering the report failed: {err}"),
            Self::Upload(err) => write!(f, "Uploading the report failed: {err}"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::Upload(err) => Some(err),
        }
    }
}

/// Deduplicating writer in front of an [`ArtifactStore`].
pub struct PublicationGate<'s, S: ArtifactStore + ?Sized> {
    store: &'s S,
}

impl<'s, S> PublicationGate<'s, S>
where
    S: ArtifactStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Returns the stored artifact for the triple, rendering and uploading it only when absent.
    ///
    /// A failing existence check is treated as a miss: the report is rendered and uploaded
    /// again. A failing upload is returned as an error.
    pub fn publish<F>(
        &self,
        subject: &str,
        report_type: ReportType,
        format: OutputFormat,
        render: F,
    ) -> Result<Publication, PublishError>
    where
        F: FnOnce() -> Result<Vec<u8>, RenderError>,
    {
        let name = artifact_name(subject, report_type, format);

        match self.store.locate(&name) {
            Ok(Some(url)) => {
                debug!("{} already published at {}", name, url);
                return Ok(Publication { url, is_new: false });
            }
            Ok(None) => debug!("{} not published yet", name),
            Err(err) => warn!("existence check for {} failed, rendering anyway: {}", name, err),
        }

        let bytes = render().map_err(PublishError::Render)?;
        let url = self
            .store
            .upload(&name, &bytes, format.content_type())
            .map_err(PublishError::Upload)?;
        info!("published {} ({} bytes)", name, bytes.len());
        Ok(Publication { url, is_new: true })
    }
}
