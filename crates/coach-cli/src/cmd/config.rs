use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use coach_core::config::{Config, ConfigWarning, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check the configuration and list the configured streams
    Validate,
}

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

fn validate(config_path: &Path, json: bool) -> anyhow::Result<()> {
    // Plain load: the findings are the output here, not a reason to stop early.
    let config = Config::load(config_path).context("failed to load config")?;
    let findings = config.validate();
    let errors = findings
        .iter()
        .filter(|f| f.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "valid": errors == 0,
            "streams": config.streams.iter().map(|s| &s.id).collect::<Vec<_>>(),
            "schedules": config.schedules.len(),
            "findings": findings,
        }))?;
    } else {
        report(&config, &findings);
    }

    if errors > 0 {
        anyhow::bail!("{errors} configuration error(s) in {}", config_path.display());
    }
    Ok(())
}

fn report(config: &Config, findings: &[ConfigWarning]) {
    for f in findings {
        let tag = match f.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("[{tag}] {}", f.message);
    }
    if findings.iter().any(|f| f.level == WarnLevel::Error) {
        return;
    }

    println!(
        "Config is valid: {} stream(s), {} schedule(s), timezone {}.",
        config.streams.len(),
        config.schedules.len(),
        config.timezone
    );
    let rows = config
        .streams
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.channel.clone(),
                s.topics.len().to_string(),
                s.poll_size.to_string(),
            ]
        })
        .collect();
    println!();
    print_table(&["STREAM", "CHANNEL", "TOPICS", "POLL"], rows);
}
