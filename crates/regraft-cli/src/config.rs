//! Optional project-level defaults from `.regraft.toml`.
//!
//! Command-line flags always win; the file only fills in what the
//! invocation left unspecified.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The config file name looked up in the working directory.
pub const CONFIG_FILE: &str = ".regraft.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Worker-pool size for the tree phase.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Where to persist the old→new root records.
    #[serde(default)]
    pub map_dir: Option<PathBuf>,

    /// Reuse an existing map directory, skipping already-mapped roots.
    #[serde(default)]
    pub resume: Option<bool>,
}

impl Settings {
    /// Load `.regraft.toml` from `root`, or defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but does not parse.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
