//! Durable record of the last completed weekly check.
//!
//! The file holds a single RFC 3339 timestamp and is rewritten in full on
//! every save. A single writer is assumed.

use chrono::{DateTime, SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, at: DateTime<Utc>) -> Result<()> {
        // Sub-second digits are kept so a reload equals the fire time exactly
        let stamp = at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        tokio::fs::write(&self.path, stamp).await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<DateTime<Utc>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::CheckpointMissing(
                    self.path.display().to_string(),
                ))
            }
            Err(e) => return Err(AppError::CheckpointIo(e)),
        };
        let parsed = DateTime::parse_from_rfc3339(raw.trim())?;
        Ok(parsed.with_timezone(&Utc))
    }
}
