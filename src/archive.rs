use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub unpacked: usize,
    /// Entries whose paths pointed outside the target directory.
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to unpack {} into {}", archive.display(), dest.display())]
    Unpack {
        archive: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("extraction task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Unpacks a gzip-compressed tarball into `dest`. Blocking.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<ExtractReport, ExtractError> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let unpack_err = |source| ExtractError::Unpack {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dest).map_err(unpack_err)?;

    let mut tarball = Archive::new(GzDecoder::new(file));
    let mut report = ExtractReport::default();
    for entry in tarball.entries().map_err(unpack_err)? {
        let mut entry = entry.map_err(unpack_err)?;
        if entry.unpack_in(dest).map_err(unpack_err)? {
            report.unpacked += 1;
        } else {
            tracing::warn!(
                entry = %entry.path().map(|p| p.display().to_string()).unwrap_or_default(),
                "skipping archive entry outside the target directory"
            );
            report.skipped += 1;
        }
    }
    Ok(report)
}

/// Runs [`extract_tar_gz`] on the blocking pool.
pub async fn extract(archive: PathBuf, dest: PathBuf) -> Result<ExtractReport, ExtractError> {
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest)).await?
}
