//! Artifact stores: where rendered reports are published.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;

/// A content store addressed by artifact name.
pub trait ArtifactStore {
    /// Returns the public URL of `name` when it already exists.
    fn locate(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Stores `bytes` under `name` and returns its public URL.
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StoreError>;
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for &T {
    fn locate(&self, name: &str) -> Result<Option<String>, StoreError> {
        (**self).locate(name)
    }

    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StoreError> {
        (**self).upload(name, bytes, content_type)
    }
}

/// Errors raised by an [`ArtifactStore`].
#[derive(Debug)]
pub enum StoreError {
    Http(reqwest::Error),
    /// The store answered with an unexpected status.
    Status { status: u16, body: String },
    Io { path: PathBuf, source: io::Error },
    Config(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "Store request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "Store responded with status {status}: {body}")
            }
            Self::Io { path, .. } => write!(f, "Store I/O failed at {}", path.display()),
            Self::Config(reason) => write!(f, "Store is not configured: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Status { .. } | Self::Config(_) => None,
        }
    }
}

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const GITHUB_REPO_ENV: &str = "GITHUB_REPO";
pub const GITHUB_BRANCH_ENV: &str = "GITHUB_BRANCH";

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_RAW: &str = "https://raw.githubusercontent.com";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_PREFIX: &str = "reportes";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("lookup_report/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

/// Store backed by a GitHub repository through the contents API.
///
/// Files are committed under `{prefix}/{name}` on `branch` and served from
/// raw.githubusercontent.com.
pub struct GitHubStore {
    client: Client,
    token: String,
    owner: String,
    repo: String,
    branch: String,
    prefix: String,
    api_base: String,
}

impl GitHubStore {
    /// Creates a store for `repository` given as `owner/repo`.
    pub fn new(token: impl Into<String>, repository: &str) -> Result<Self, StoreError> {
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| {
                StoreError::Config(format!(
                    "repository '{}' is not in owner/repo form",
                    repository
                ))
            })?;
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StoreError::Config("GitHub token is empty".into()));
        }

        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            token,
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            branch: DEFAULT_BRANCH.to_owned(),
            prefix: DEFAULT_PREFIX.to_owned(),
            api_base: GITHUB_API.to_owned(),
        })
    }

    /// Reads `GITHUB_TOKEN`, `GITHUB_REPO` and optionally `GITHUB_BRANCH`.
    pub fn from_env() -> Result<Self, StoreError> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        let token = read(GITHUB_TOKEN_ENV)
            .ok_or_else(|| StoreError::Config(format!("{} is not set", GITHUB_TOKEN_ENV)))?;
        let repository = read(GITHUB_REPO_ENV)
            .ok_or_else(|| StoreError::Config(format!("{} is not set", GITHUB_REPO_ENV)))?;

        let store = Self::new(token, &repository)?;
        Ok(match read(GITHUB_BRANCH_ENV) {
            Some(branch) => store.with_branch(branch),
            None => store,
        })
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Directory inside the repository that receives the artifacts.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, StoreError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Sends requests through `client`, e.g. one with custom proxy or TLS settings.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Points the store at another API host, such as GitHub Enterprise.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    fn path_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    fn contents_url(&self, name: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            self.path_for(name)
        )
    }

    /// Public download URL of `name`.
    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            GITHUB_RAW,
            self.owner,
            self.repo,
            self.branch,
            self.path_for(name)
        )
    }

    fn authorization(&self) -> String {
        format!("token {}", self.token)
    }

    /// Resolves a 422 answer to a PUT: the contents API refuses to overwrite a file without its
    /// `sha`, so another writer got there first and its copy is kept.
    fn existing_upload(
        &self,
        name: &str,
        response: reqwest::blocking::Response,
    ) -> Result<String, StoreError> {
        let body = response.text().unwrap_or_default();
        let exists = body.contains("sha") || matches!(self.locate(name), Ok(Some(_)));
        if !exists {
            return Err(StoreError::Status { status: 422, body });
        }
        let url = self.public_url(name);
        debug!("{} already exists in {}/{}; keeping the first copy", name, self.owner, self.repo);
        Ok(url)
    }
}

fn build_client(timeout: Duration) -> Result<Client, StoreError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

fn status_error(response: reqwest::blocking::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    StoreError::Status { status, body }
}

impl ArtifactStore for GitHubStore {
    fn locate(&self, name: &str) -> Result<Option<String>, StoreError> {
        let response = self
            .client
            .get(self.contents_url(name))
            .query(&[("ref", self.branch.as_str())])
            .header("Authorization", self.authorization())
            .header("Accept", "application/vnd.github+json")
            .send()?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(self.public_url(name))),
            _ => Err(status_error(response)),
        }
    }

    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StoreError> {
        let body = PutContents {
            message: format!("Report generated: {}", name),
            content: STANDARD.encode(bytes),
            branch: &self.branch,
        };
        debug!(
            "uploading {} ({}, {} bytes) to {}/{}",
            name,
            content_type,
            bytes.len(),
            self.owner,
            self.repo
        );

        let response = self
            .client
            .put(self.contents_url(name))
            .header("Authorization", self.authorization())
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()?;

        match response.status() {
            status if status.is_success() => {
                let url = self.public_url(name);
                info!("published {}", url);
                Ok(url)
            }
            StatusCode::UNPROCESSABLE_ENTITY => self.existing_upload(name, response),
            _ => Err(status_error(response)),
        }
    }
}

/// Store writing artifacts into a local directory.
///
/// Files are never overwritten: when two writers race, the first one wins and the second
/// simply receives the existing URL.
pub struct DirectoryStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Serves artifacts as `{base_url}/{name}` instead of `file://` URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_owned());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, path: &Path, name: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base, name),
            None => format!("file://{}", path.display()),
        }
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ArtifactStore for DirectoryStore {
    fn locate(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.root.join(name);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(self.url_for(&path, name))),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(&path, err)),
        }
    }

    fn upload(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<String, StoreError> {
        fs::create_dir_all(&self.root).map_err(|err| Self::io_error(&self.root, err))?;
        let path = self.root.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .and_then(|()| file.sync_all())
                    .map_err(|err| Self::io_error(&path, err))?;
                info!("wrote {} ({} bytes)", path.display(), bytes.len());
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists; keeping the first copy", path.display());
            }
            Err(err) => return Err(Self::io_error(&path, err)),
        }
        Ok(self.url_for(&path, name))
    }
}
