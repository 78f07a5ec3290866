use crate::output::{print_json, print_table};
use clap::Subcommand;
use coach_core::store::Store;
use coach_core::votes;
use std::path::Path;

#[derive(Subcommand)]
pub enum VotesSubcommand {
    /// Show the vote ledger for a delivered message
    Show {
        /// Message id (the platform's message ts)
        message_id: String,
    },
}

pub fn run(config_path: &Path, subcmd: VotesSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        VotesSubcommand::Show { message_id } => show(config_path, &message_id, json),
    }
}

fn show(config_path: &Path, message_id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = Store::open_read_only(&config.state_dir)?;
    let ledger = votes::load(&store, message_id)?;

    if json {
        return print_json(&ledger);
    }
    let Some(ledger) = ledger else {
        println!("No votes recorded for message {message_id}.");
        return Ok(());
    };
    if let (Some(stream), Some(period)) = (&ledger.stream_id, &ledger.period) {
        println!("{stream} {period}: {}", ledger.topic.as_deref().unwrap_or("-"));
    }
    let rows = ledger
        .ballots
        .iter()
        .flat_map(|(name, ballot)| {
            ballot
                .counts
                .iter()
                .map(move |(option, n)| vec![name.clone(), option.clone(), n.to_string()])
        })
        .collect();
    print_table(&["BALLOT", "OPTION", "VOTES"], rows);
    if let Some(winner) = ledger.next_topic_winner() {
        println!("\nNext topic leader: {winner}");
    }
    Ok(())
}
