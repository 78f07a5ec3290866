pub mod config;
pub mod deliver;
pub mod schedule;
pub mod serve;
pub mod state;
pub mod votes;

use anyhow::Context;
use coach_core::config::Config;
use std::path::Path;

/// Load the configuration and refuse to continue on error-level findings.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let (config, warnings) = Config::load_valid(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    for w in &warnings {
        tracing::warn!("config: {}", w.message);
    }
    Ok(config)
}
