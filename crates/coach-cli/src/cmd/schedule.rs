use crate::output::print_json;
use anyhow::Context;
use coach_core::schedule::{CronDaemon, EnvSnapshot, Multiplexer, TimerTable, CONFIG_VAR};
use std::path::Path;

pub fn run(config_path: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if config.schedules.is_empty() {
        anyhow::bail!("no schedules configured");
    }

    // Jobs start in cron's working directory, not ours.
    let config_abs = std::fs::canonicalize(config_path)
        .with_context(|| format!("failed to resolve {}", config_path.display()))?;
    let config_abs = config_abs
        .to_str()
        .context("config path is not valid UTF-8")?;
    let mut env = EnvSnapshot::capture();
    env.set(CONFIG_VAR, config_abs)?;

    let mut table = TimerTable::build(&config.schedules, env, TimerTable::own_stdout())?;
    if config.state_dir.is_relative() {
        table.warnings.push(format!(
            "state_dir '{}' is relative; jobs resolve it from cron's working directory",
            config.state_dir.display()
        ));
    }

    if dry_run {
        if json {
            print_json(&serde_json::json!({
                "table": table.render_redacted(),
                "warnings": table.warnings,
            }))?;
        } else {
            for w in &table.warnings {
                eprintln!("warning: {w}");
            }
            print!("{}", table.render_redacted());
        }
        return Ok(());
    }

    let mut mux = Multiplexer::new(table, CronDaemon::default());
    mux.install()?;
    match mux.run()? {}
}
