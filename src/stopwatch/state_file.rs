use std::{io::ErrorKind, path::PathBuf};

use anyhow::Result;
use tracing::warn;

use super::Stopwatch;

/// Keeps the stopwatch between invocations of the cli and the daemon.
#[derive(Debug, Clone)]
pub struct StopwatchFile {
    path: PathBuf,
}

impl StopwatchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn load(&self) -> Result<Stopwatch> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => match serde_json::from_slice(&content) {
                Ok(stopwatch) => Ok(stopwatch),
                Err(e) => {
                    // A broken state file only loses the current session.
                    warn!("Stopwatch state in {:?} is corrupted {e}", self.path);
                    Ok(Stopwatch::default())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Stopwatch::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, stopwatch: &Stopwatch) -> Result<()> {
        let content = serde_json::to_vec(stopwatch)?;
        let temporary = self.path.with_extension("tmp");
        tokio::fs::write(&temporary, content).await?;
        tokio::fs::rename(&temporary, &self.path).await?;
        Ok(())
    }
}
