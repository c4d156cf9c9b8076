//! Streaming artifact download into the scratch directory.

use super::http;
use crate::error::{Result, UpdateError};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes read from the network per iteration.
const CHUNK_SIZE: usize = 8 * 1024;

/// Name used when the URL has no usable final path segment.
const FALLBACK_FILE_NAME: &str = "update.bin";

/// A fully downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads update artifacts into a fixed directory.
pub struct Downloader {
    agent: ureq::Agent,
    dest_dir: PathBuf,
}

impl Downloader {
    pub fn new(timeout: Duration, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            agent: http::streaming_agent(timeout),
            dest_dir: dest_dir.into(),
        }
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Streams `url` to `<dest_dir>/<last path segment>`.
    ///
    /// The body is copied in fixed-size chunks; it is never held in memory.
    /// No file is created unless the server answers `200`. A failure
    /// mid-stream leaves the partial file in place for the owner of the
    /// directory to clean up.
    pub fn download(&self, url: &str) -> Result<DownloadedArtifact> {
        let parsed = url::Url::parse(url)
            .map_err(|e| UpdateError::Parse(format!("invalid download URL {url:?}: {e}")))?;
        let dest = self.dest_dir.join(artifact_file_name(&parsed));

        tracing::info!("downloading update from {url} to {}", dest.display());
        let resp = http::get_ok(&self.agent, url)?;

        let mut reader = resp.into_reader();
        let mut file = std::fs::File::create(&dest).map_err(|e| {
            UpdateError::Filesystem(format!("cannot create {}: {e}", dest.display()))
        })?;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(UpdateError::Network(format!(
                        "download of {url} interrupted after {written} bytes: {e}"
                    )));
                }
            };
            file.write_all(&buf[..n]).map_err(|e| {
                UpdateError::Filesystem(format!("write to {} failed: {e}", dest.display()))
            })?;
            written += n as u64;
        }
        file.sync_all().map_err(|e| {
            UpdateError::Filesystem(format!("cannot flush {}: {e}", dest.display()))
        })?;

        tracing::info!("downloaded {written} bytes to {}", dest.display());
        Ok(DownloadedArtifact {
            path: dest,
            bytes: written,
        })
    }
}

/// Final non-empty path segment of `url`, or [`FALLBACK_FILE_NAME`].
fn artifact_file_name(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_owned)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned())
}
