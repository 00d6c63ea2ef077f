use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use thiserror::Error;

use crate::archive::{self, ExtractError, ExtractReport};
use crate::config::Config;
use crate::release::{ReleaseClient, ReleaseDescriptor, ReleaseError};

/// The three fallible steps of fetching a theme bundle.
///
/// [`PipelineState::advance`] only talks to the outside world through this
/// trait, so the state machine can be driven by fakes in tests.
pub trait AssetSteps {
    fn resolve(&self) -> impl Future<Output = Result<ReleaseDescriptor, ReleaseError>> + Send;

    fn download(
        &self,
        descriptor: &ReleaseDescriptor,
    ) -> impl Future<Output = Result<u64, ReleaseError>> + Send;

    fn extract(&self) -> impl Future<Output = Result<ExtractReport, ExtractError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingVersion,
    Downloading,
    Extracting,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("error getting latest version")]
    Resolve(#[source] ReleaseError),
    #[error("error downloading themes")]
    Download(#[source] ReleaseError),
    #[error("error extracting themes")]
    Extract(#[source] ExtractError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Resolve(_) => Stage::ResolvingVersion,
            PipelineError::Download(_) => Stage::Downloading,
            PipelineError::Extract(_) => Stage::Extracting,
        }
    }
}

#[derive(Debug)]
pub enum PipelineState {
    ResolvingVersion,
    Downloading(ReleaseDescriptor),
    Extracting {
        descriptor: ReleaseDescriptor,
        bytes: u64,
    },
    Done {
        descriptor: ReleaseDescriptor,
        report: ExtractReport,
    },
    Failed(PipelineError),
}

impl PipelineState {
    /// The stage about to run, or `None` once terminal.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::ResolvingVersion => Some(Stage::ResolvingVersion),
            PipelineState::Downloading(_) => Some(Stage::Downloading),
            PipelineState::Extracting { .. } => Some(Stage::Extracting),
            PipelineState::Done { .. } | PipelineState::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_none()
    }

    /// Performs exactly one transition. Terminal states are returned unchanged.
    pub async fn advance<S: AssetSteps>(self, steps: &S) -> Self {
        match self {
            PipelineState::ResolvingVersion => match steps.resolve().await {
                Ok(descriptor) => PipelineState::Downloading(descriptor),
                Err(err) => PipelineState::Failed(PipelineError::Resolve(err)),
            },
            PipelineState::Downloading(descriptor) => match steps.download(&descriptor).await {
                Ok(bytes) => PipelineState::Extracting { descriptor, bytes },
                Err(err) => PipelineState::Failed(PipelineError::Download(err)),
            },
            PipelineState::Extracting { descriptor, .. } => match steps.extract().await {
                Ok(report) => PipelineState::Done { descriptor, report },
                Err(err) => PipelineState::Failed(PipelineError::Extract(err)),
            },
            terminal => terminal,
        }
    }
}

/// Drives the pipeline from `ResolvingVersion` to a terminal state and logs the outcome.
pub async fn run<S: AssetSteps>(steps: &S) -> PipelineState {
    let mut state = PipelineState::ResolvingVersion;
    while !state.is_terminal() {
        tracing::debug!(stage = ?state.stage(), "pipeline step");
        state = state.advance(steps).await;
    }

    match &state {
        PipelineState::Done { descriptor, report } => tracing::info!(
            tag = %descriptor.tag,
            unpacked = report.unpacked,
            skipped = report.skipped,
            "themes downloaded and extracted successfully"
        ),
        PipelineState::Failed(err) => tracing::error!(
            stage = ?err.stage(),
            error = err as &dyn std::error::Error,
            "theme pipeline failed"
        ),
        _ => {}
    }
    state
}

/// The real steps: GitHub release lookup, streaming download, tarball extraction.
#[derive(Debug, Clone)]
pub struct ReleaseSteps {
    client: ReleaseClient,
    archive_path: PathBuf,
    themes_dir: PathBuf,
}

impl ReleaseSteps {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: ReleaseClient::new(config)?,
            archive_path: config.archive_path.clone(),
            themes_dir: config.themes_dir.clone(),
        })
    }
}

impl AssetSteps for ReleaseSteps {
    async fn resolve(&self) -> Result<ReleaseDescriptor, ReleaseError> {
        self.client.latest_release().await
    }

    async fn download(&self, descriptor: &ReleaseDescriptor) -> Result<u64, ReleaseError> {
        self.client
            .download_to(&descriptor.download_url, &self.archive_path)
            .await
    }

    async fn extract(&self) -> Result<ExtractReport, ExtractError> {
        archive::extract(self.archive_path.clone(), self.themes_dir.clone()).await
    }
}
