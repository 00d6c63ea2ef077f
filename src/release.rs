use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::{Config, ReleaseSource};

const GITHUB_ACCEPT_HEADER: &str = "application/vnd.github+json";

#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: Client,
    source: ReleaseSource,
    authorization: Option<header::HeaderValue>,
}

/// The latest published release and where its archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub tag: String,
    pub download_url: Url,
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("request failed")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        url: Url,
        status: StatusCode,
        body: String,
    },
    #[error("failed to parse release metadata")]
    Decode(#[source] reqwest::Error),
    #[error("release metadata has no tag name")]
    MissingTag,
    #[error("release tag {0:?} cannot be used as a version path segment")]
    InvalidTag(String),
    #[error("cannot build a release url from {0}")]
    InvalidBase(Url),
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    #[serde(default)]
    tag_name: Option<String>,
}

impl ReleaseClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .context("invalid user agent header value")?,
        );
        let authorization = match &config.github_token {
            Some(token) => {
                let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .context("invalid token header value")?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        let client = Client::builder()
            .default_headers(default_headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            source: config.release.clone(),
            authorization,
        })
    }

    pub fn latest_release_url(&self) -> Result<Url, ReleaseError> {
        let base = &self.source.api_base_url;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ReleaseError::InvalidBase(base.clone()))?
            .pop_if_empty()
            .extend([
                "repos",
                self.source.owner.as_str(),
                self.source.repo.as_str(),
                "releases",
                "latest",
            ]);
        Ok(url)
    }

    /// Builds `<download-base>/<owner>/<repo>/releases/download/<tag>/<archive>`.
    ///
    /// The tag is pushed as a single path segment, so a `/` inside it is
    /// percent-encoded rather than adding segments. Tags that would vanish
    /// from the path (empty, `.`, `..`) are rejected.
    pub fn download_url(&self, tag: &str) -> Result<Url, ReleaseError> {
        if matches!(tag, "" | "." | "..") {
            return Err(ReleaseError::InvalidTag(tag.to_string()));
        }
        let base = &self.source.download_base_url;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ReleaseError::InvalidBase(base.clone()))?
            .pop_if_empty()
            .extend([
                self.source.owner.as_str(),
                self.source.repo.as_str(),
                "releases",
                "download",
                tag,
                self.source.archive_name.as_str(),
            ]);
        Ok(url)
    }

    pub async fn latest_release(&self) -> Result<ReleaseDescriptor, ReleaseError> {
        let url = self.latest_release_url()?;
        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, GITHUB_ACCEPT_HEADER);
        if let Some(value) = &self.authorization {
            request = request.header(header::AUTHORIZATION, value.clone());
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let body: ApiRelease = response.json().await.map_err(ReleaseError::Decode)?;
                let tag = body
                    .tag_name
                    .filter(|tag| !tag.is_empty())
                    .ok_or(ReleaseError::MissingTag)?;
                let download_url = self.download_url(&tag)?;
                tracing::debug!(%tag, %download_url, "resolved latest release");
                Ok(ReleaseDescriptor { tag, download_url })
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unavailable>".to_string());
                Err(ReleaseError::Status { url, status, body })
            }
        }
    }

    /// Streams `url` into `path` chunk by chunk, returning the number of bytes written.
    ///
    /// A failure after the file was created leaves the partial file in place.
    pub async fn download_to(&self, url: &Url, path: &Path) -> Result<u64, ReleaseError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::Status {
                url: url.clone(),
                status,
                body: String::new(),
            });
        }

        let io_err = |source| ReleaseError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        tracing::debug!(%url, path = %path.display(), bytes = written, "download finished");
        Ok(written)
    }
}
