use crate::output::print_json;
use crate::Secrets;
use anyhow::Context;
use chrono::Utc;
use coach_core::delivery::{DeliveryJob, RunOutcome};
use coach_core::slack::SlackClient;
use coach_core::store::Store;
use coach_core::{dedup, period};
use std::path::Path;

pub fn run(
    config_path: &Path,
    stream: &str,
    period: Option<String>,
    secrets: &Secrets,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    config.stream(stream)?;
    let period = match period {
        Some(p) => p,
        None => period::period_key(Utc::now(), config.tz()?),
    };
    let store = Store::open(&config.state_dir)?;

    // Cheap lock-free check so a repeat tick needs no credentials or network.
    // The job repeats the check under the stream's lock.
    let outcome = if dedup::load(&store, stream)?.is_some_and(|r| r.covers(&period)) {
        tracing::info!(stream, period = %period, "already delivered");
        RunOutcome::AlreadyDelivered
    } else {
        let generator =
            coach_agent::backend(&config.generation, secrets.anthropic_api_key.clone())
                .context("generation backend")?;
        let slack = SlackClient::from_config(
            &config.slack,
            secrets.slack_bot_token.clone(),
            secrets.slack_webhook_url.clone(),
        )?;
        DeliveryJob::new(&store, &config, generator.as_ref(), &slack).run(stream, &period)?
    };

    if json {
        print_json(&serde_json::json!({
            "stream": stream,
            "period": period,
            "result": outcome,
        }))?;
    } else {
        match &outcome {
            RunOutcome::Delivered { message_id, topic } => println!(
                "Delivered '{topic}' to {stream} for {period} (message {}).",
                message_id.as_deref().unwrap_or("-")
            ),
            RunOutcome::AlreadyDelivered => {
                println!("Stream {stream} already delivered for {period}.")
            }
        }
    }
    Ok(())
}
