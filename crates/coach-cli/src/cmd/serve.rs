use crate::Secrets;
use anyhow::Context;
use coach_core::store::Store;
use coach_server::AppState;
use std::path::Path;

pub fn run(config_path: &Path, port: Option<u16>, secrets: &Secrets) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let secret = secrets
        .slack_signing_secret
        .clone()
        .filter(|s| !s.trim().is_empty())
        .context("SLACK_SIGNING_SECRET is required to accept callbacks")?;
    let store = Store::open(&config.state_dir)?;
    let state = AppState::new(store, secret, config.server.replay_window_secs)?;
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(coach_server::serve(
        state,
        port,
        config.server.max_concurrent_requests,
    ))
}
