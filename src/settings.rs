//! Optional `settings.json` inside the application directory. Every field has a default, so the
//! file only needs the values that differ.

use std::{io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rollover::config::RolloverConfig;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// User the cli acts for when `--user` isn't passed.
    pub user: Option<String>,
    pub rollover: RolloverConfig,
}

impl Settings {
    pub async fn load(application_dir: &Path) -> Result<Self> {
        let path = application_dir.join(SETTINGS_FILE);
        match tokio::fs::read(&path).await {
            Ok(content) => serde_json::from_slice(&content)
                .with_context(|| format!("Invalid settings in {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }
}
