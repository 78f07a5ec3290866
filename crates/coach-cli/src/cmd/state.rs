use crate::output::{print_json, print_table};
use clap::Subcommand;
use coach_core::dedup;
use coach_core::store::Store;
use std::path::Path;

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Show the last delivery recorded for a stream
    Show {
        /// Stream id
        stream: String,
    },
}

pub fn run(config_path: &Path, subcmd: StateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StateSubcommand::Show { stream } => show(config_path, &stream, json),
    }
}

fn show(config_path: &Path, stream: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = Store::open_read_only(&config.state_dir)?;
    let record = dedup::load(&store, stream)?;

    if json {
        return print_json(&record);
    }
    let Some(r) = record else {
        println!("Stream {stream} has no delivery recorded.");
        return Ok(());
    };
    print_table(
        &["STREAM", "PERIOD", "MESSAGE", "TOPIC", "DELIVERED"],
        vec![vec![
            r.stream_id,
            r.last_period,
            r.last_message_id.unwrap_or_else(|| "-".into()),
            r.topic.unwrap_or_else(|| "-".into()),
            r.delivered_at.to_rfc3339(),
        ]],
    );
    Ok(())
}
