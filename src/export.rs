//! Result export.
//!
//! A finalized session is written out exactly once. The file sink is
//! behind a trait so the state machine tests can assert on exported
//! results without touching the filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use codesage_types::SessionResult;

#[async_trait]
#[cfg_attr(test, automock)]
pub trait ResultExporter: Send + Sync {
    async fn export(&self, result: &SessionResult) -> Result<()>;
}

/// Writes one pretty-printed JSON file per session into a fixed
/// directory, named after the session id.
pub struct JsonFileExporter {
    dir: PathBuf,
}

impl JsonFileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("interview_results_{session_id}.json"))
    }

    fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ResultExporter for JsonFileExporter {
    async fn export(&self, result: &SessionResult) -> Result<()> {
        tokio::fs::create_dir_all(self.dir())
            .await
            .with_context(|| format!("creating results dir {}", self.dir.display()))?;
        let path = self.path_for(&result.session_id);
        let json = serde_json::to_string_pretty(result).context("serializing session result")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Session results saved to {}", path.display());
        Ok(())
    }
}
