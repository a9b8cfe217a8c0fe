//! Filesystem writability probe.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, PreflightError, Result};
use crate::health::check::ProbeResult;
use crate::health::probe::Probe;

const PROBE_PAYLOAD: &[u8] = b"preflight filesystem probe";

/// Confirms a scratch directory exists and accepts writes.
pub struct FilesystemProbe {
    scratch_dir: PathBuf,
}

impl FilesystemProbe {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    async fn write_read_delete(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| io_failure("Could not create scratch directory", e))?;

        let path = self
            .scratch_dir
            .join(format!(".preflight-probe-{}.tmp", Uuid::new_v4()));

        let outcome = Self::round_trip(&path).await;

        let cleanup = match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), error = %e, "Could not remove probe file");
                Err(io_failure("Could not remove probe file", e))
            }
            _ => Ok(()),
        };

        outcome.and(cleanup)
    }

    async fn round_trip(path: &Path) -> Result<()> {
        tokio::fs::write(path, PROBE_PAYLOAD)
            .await
            .map_err(|e| io_failure("Could not write probe file", e))?;
        let read_back = tokio::fs::read(path)
            .await
            .map_err(|e| io_failure("Could not read probe file", e))?;
        if read_back != PROBE_PAYLOAD {
            return Err(PreflightError::new(
                ErrorCode::IoError,
                "Probe file content did not match what was written",
            ));
        }
        Ok(())
    }
}

fn io_failure(action: &'static str, error: std::io::Error) -> PreflightError {
    PreflightError::with_internal(ErrorCode::IoError, action, error.to_string()).with_source(error)
}

#[async_trait]
impl Probe for FilesystemProbe {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();
        let dir = self.scratch_dir.display().to_string();

        match self.write_read_delete().await {
            Ok(()) => ProbeResult::healthy(self.name())
                .with_latency(start.elapsed())
                .with_detail("scratch_dir", &dir)
                .with_detail("writable", true),
            Err(e) => {
                let message = match e.internal_message() {
                    Some(reason) => format!("{}: {}", e.user_message(), reason),
                    None => e.user_message().to_string(),
                };
                error!(scratch_dir = %dir, error = %message, "Filesystem health check failed");
                ProbeResult::unhealthy(self.name())
                    .with_latency(start.elapsed())
                    .with_detail("scratch_dir", &dir)
                    .with_detail("writable", false)
                    .with_message(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::check::ProbeStatus;

    #[tokio::test]
    async fn test_writable_dir_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FilesystemProbe::new(dir.path());
        let result = probe.run().await;
        assert_eq!(result.status, ProbeStatus::Healthy);
        assert_eq!(result.detail["writable"], true);
    }

    #[tokio::test]
    async fn test_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let result = FilesystemProbe::new(&nested).run().await;
        assert_eq!(result.status, ProbeStatus::Healthy);
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_leaves_no_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        FilesystemProbe::new(dir.path()).run().await;
        FilesystemProbe::new(dir.path()).run().await;
        let leftover = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_path_under_a_file_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let result = FilesystemProbe::new(file.join("scratch")).run().await;
        assert_eq!(result.status, ProbeStatus::Unhealthy);
        assert_eq!(result.detail["writable"], false);
        assert!(result.message.is_some());
    }
}
