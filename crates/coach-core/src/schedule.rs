//! Schedule multiplexer: maps configured (cron, command) pairs onto a single
//! cron daemon.
//!
//! At startup the whole timer table is rebuilt from configuration:
//! - every cron expression is validated,
//! - output redirections are stripped from each command and replaced by one
//!   that appends stdout and stderr to this process's own stdout,
//! - a snapshot of the environment is prepended as `NAME=value` lines, since
//!   the daemon starts jobs with an empty environment.
//!
//! The table is installed in one `crontab -` call over stdin, then the daemon
//! runs in the foreground. The daemon returning for any reason is fatal.

use crate::error::{CoachError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub cron: String,
    pub command: String,
}

// ---------------------------------------------------------------------------
// Cron validation
// ---------------------------------------------------------------------------

const MACROS: &[&str] = &[
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAYS: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
    /// Names map to `min + index`.
    names: &'static [&'static str],
}

const FIELDS: [Field; 5] = [
    Field { name: "minute", min: 0, max: 59, names: &[] },
    Field { name: "hour", min: 0, max: 23, names: &[] },
    Field { name: "day-of-month", min: 1, max: 31, names: &[] },
    Field { name: "month", min: 1, max: 12, names: MONTHS },
    // 7 is accepted as Sunday.
    Field { name: "day-of-week", min: 0, max: 7, names: WEEKDAYS },
];

pub fn validate_cron(expr: &str) -> Result<()> {
    let invalid = |reason: String| CoachError::InvalidSchedule {
        expr: expr.to_string(),
        reason,
    };
    let trimmed = expr.trim();
    if trimmed.starts_with('@') {
        return if MACROS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(invalid(format!("unknown macro '{trimmed}'")))
        };
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() != FIELDS.len() {
        return Err(invalid(format!(
            "expected 5 fields (minute hour day-of-month month day-of-week), got {}",
            parts.len()
        )));
    }
    for (part, field) in parts.iter().zip(FIELDS.iter()) {
        check_field(part, field).map_err(|reason| invalid(format!("{}: {reason}", field.name)))?;
    }
    Ok(())
}

fn check_field(spec: &str, field: &Field) -> std::result::Result<(), String> {
    for item in spec.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (item, None),
        };
        if let Some(step) = step {
            match step.parse::<u32>() {
                Ok(n) if n > 0 => {}
                _ => return Err(format!("bad step '{step}'")),
            }
        }
        if range == "*" {
            continue;
        }
        match range.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (value(lo, field)?, value(hi, field)?);
                if lo > hi {
                    return Err(format!("range '{range}' runs backwards"));
                }
            }
            None => {
                value(range, field)?;
            }
        }
    }
    Ok(())
}

fn value(token: &str, field: &Field) -> std::result::Result<u32, String> {
    let lower = token.to_ascii_lowercase();
    if let Some(i) = field.names.iter().position(|n| *n == lower) {
        return Ok(field.min + i as u32);
    }
    let n: u32 = token
        .parse()
        .map_err(|_| format!("'{token}' is not a number"))?;
    if n < field.min || n > field.max {
        return Err(format!("{n} is outside {}-{}", field.min, field.max));
    }
    Ok(n)
}

// ---------------------------------------------------------------------------
// Redirection stripping
// ---------------------------------------------------------------------------

/// Remove output redirections (`>`, `>>`, `N>`, `&>`, `>&N`, `N>&M`, ...)
/// and their targets, honouring shell quoting. An unchanged command is
/// returned trimmed but otherwise verbatim.
pub fn strip_redirections(command: &str) -> String {
    let chars: Vec<char> = command.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut stripped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = closing_quote(&chars, i);
                word.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '\\' => {
                word.push(c);
                if let Some(next) = chars.get(i + 1) {
                    word.push(*next);
                    i += 1;
                }
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
            }
            '>' => {
                stripped = true;
                // A numeric or `&` prefix belongs to the operator.
                let fd_prefix =
                    word == "&" || (!word.is_empty() && word.chars().all(|d| d.is_ascii_digit()));
                if !fd_prefix && !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
                word.clear();
                i += 1;
                match chars.get(i) {
                    Some('>') => i += 1,
                    Some('&') => {
                        i += 1;
                        if chars.get(i).is_some_and(|d| d.is_ascii_digit() || *d == '-') {
                            while chars.get(i).is_some_and(|d| d.is_ascii_digit() || *d == '-') {
                                i += 1;
                            }
                            continue;
                        }
                    }
                    _ => {}
                }
                while chars.get(i).is_some_and(|w| w.is_whitespace()) {
                    i += 1;
                }
                i = end_of_word(&chars, i);
                continue;
            }
            _ => word.push(c),
        }
        i += 1;
    }
    if !word.is_empty() {
        words.push(word);
    }

    if stripped {
        words.join(" ")
    } else {
        command.trim().to_string()
    }
}

/// Index just past the quote opened at `start`.
fn closing_quote(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if quote == '"' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn end_of_word(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        match chars[i] {
            '\'' | '"' => i = closing_quote(chars, i),
            '\\' => i += 2,
            c if c.is_whitespace() => break,
            _ => i += 1,
        }
    }
    i.min(chars.len())
}

// ---------------------------------------------------------------------------
// Environment snapshot
// ---------------------------------------------------------------------------

/// Shell bookkeeping variables that must not leak into jobs.
const EXCLUDED_VARS: &[&str] = &["PWD", "OLDPWD", "SHLVL", "_"];

/// Where jobs find the configuration. Cron starts them in the user's home
/// directory, so a relative config path would not resolve.
pub const CONFIG_VAR: &str = "COACH_CONFIG";

/// Not secret; shown as-is in redacted renders.
const PLAIN_VARS: &[&str] = &[CONFIG_VAR];

#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
    pub skipped: Vec<String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut snapshot = Self::default();
        for (name, value) in vars {
            if EXCLUDED_VARS.contains(&name.as_str()) {
                continue;
            }
            if !valid_name(&name) {
                snapshot.skipped.push(name);
                continue;
            }
            match cron_value(&value) {
                Some(v) => {
                    snapshot.vars.insert(name, v);
                }
                None => snapshot.skipped.push(name),
            }
        }
        snapshot.skipped.sort();
        snapshot
    }

    /// Add or replace one variable.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        if !valid_name(name) {
            return Err(CoachError::Config(format!(
                "'{name}' is not a valid environment variable name"
            )));
        }
        let rendered = cron_value(value).ok_or_else(|| {
            CoachError::Config(format!("value of {name} cannot be written to a crontab"))
        })?;
        self.skipped.retain(|n| n != name);
        self.vars.insert(name.to_string(), rendered);
        Ok(())
    }

    /// The value as it will be rendered into the table.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Render a value as cron reads it: bare when unambiguous, otherwise quoted.
fn cron_value(value: &str) -> Option<String> {
    if value.contains('\n') || value.contains('\r') {
        return None;
    }
    let needs_quotes = value.is_empty()
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.starts_with(['"', '\'']);
    if !needs_quotes {
        return Some(value.to_string());
    }
    if !value.contains('"') {
        Some(format!("\"{value}\""))
    } else if !value.contains('\'') {
        Some(format!("'{value}'"))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// TimerTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TimerLine {
    pub cron: String,
    pub command: String,
}

impl TimerLine {
    /// The command as the daemon's shell runs it, output sent to `log_target`.
    pub fn shell_command(&self, log_target: &str) -> String {
        format!("{} >> {log_target} 2>&1", self.command)
    }
}

#[derive(Debug, Clone)]
pub struct TimerTable {
    pub lines: Vec<TimerLine>,
    pub env: EnvSnapshot,
    pub log_target: String,
    pub warnings: Vec<String>,
}

impl TimerTable {
    pub fn build(entries: &[ScheduleEntry], env: EnvSnapshot, log_target: impl Into<String>) -> Result<Self> {
        let mut warnings = Vec::new();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            validate_cron(&entry.cron)?;
            let command = strip_redirections(&entry.command);
            if command.is_empty() {
                return Err(CoachError::InvalidSchedule {
                    expr: entry.cron.clone(),
                    reason: "command is empty".to_string(),
                });
            }
            if command != entry.command.trim() {
                warnings.push(format!(
                    "stripped output redirection from '{}' (now '{command}')",
                    entry.command.trim()
                ));
            }
            lines.push(TimerLine {
                cron: entry.cron.trim().to_string(),
                command,
            });
        }
        for name in &env.skipped {
            warnings.push(format!("environment variable {name} cannot be passed to jobs"));
        }
        Ok(Self {
            lines,
            env,
            log_target: log_target.into(),
            warnings,
        })
    }

    /// Log target for the current process's stdout.
    pub fn own_stdout() -> String {
        format!("/proc/{}/fd/1", std::process::id())
    }

    pub fn render(&self) -> String {
        self.render_with(|_, v| v.to_string())
    }

    /// Same table with every environment value masked.
    pub fn render_redacted(&self) -> String {
        self.render_with(|name, v| {
            if PLAIN_VARS.contains(&name) {
                v.to_string()
            } else {
                "***".to_string()
            }
        })
    }

    fn render_with(&self, value: impl Fn(&str, &str) -> String) -> String {
        let mut out = String::from("# generated by coach schedule; rebuilt on every start\n");
        for (name, v) in &self.env.vars {
            out.push_str(&format!("{name}={}\n", value(name.as_str(), v.as_str())));
        }
        out.push('\n');
        for line in &self.lines {
            // `%` ends the command in a crontab line unless escaped.
            let cmd = line.shell_command(&self.log_target).replace('%', "\\%");
            out.push_str(&format!("{} {cmd}\n", line.cron));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// TimerFacility / CronDaemon
// ---------------------------------------------------------------------------

pub trait TimerFacility {
    /// Replace the whole installed table.
    fn install(&mut self, table: &str) -> Result<()>;
    /// Run in the foreground. Returning at all means the facility stopped.
    fn run(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CronDaemon {
    pub crontab: String,
    pub daemon: String,
    pub daemon_args: Vec<String>,
}

impl Default for CronDaemon {
    fn default() -> Self {
        Self {
            crontab: "crontab".to_string(),
            daemon: "cron".to_string(),
            daemon_args: vec!["-f".to_string()],
        }
    }
}

impl TimerFacility for CronDaemon {
    fn install(&mut self, table: &str) -> Result<()> {
        let mut child = Command::new(&self.crontab)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoachError::ScheduleInstallFailed(format!("{}: {e}", self.crontab)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(table.as_bytes()).map_err(|e| {
                CoachError::ScheduleInstallFailed(format!("failed to write table: {e}"))
            })?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| CoachError::ScheduleInstallFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoachError::ScheduleInstallFailed(format!(
                "{} exited with {}: {}",
                self.crontab,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let status = Command::new(&self.daemon)
            .args(&self.daemon_args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| CoachError::TimerExited(format!("could not start {}: {e}", self.daemon)))?;
        Err(CoachError::TimerExited(format!(
            "{} exited with {status}",
            self.daemon
        )))
    }
}

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    Idle,
    Installed,
    Running,
}

pub struct Multiplexer<F: TimerFacility> {
    facility: F,
    table: TimerTable,
    state: MuxState,
}

impl<F: TimerFacility> Multiplexer<F> {
    pub fn new(table: TimerTable, facility: F) -> Self {
        for w in &table.warnings {
            warn!("{w}");
        }
        Self {
            facility,
            table,
            state: MuxState::Idle,
        }
    }

    pub fn state(&self) -> MuxState {
        self.state
    }

    pub fn table(&self) -> &TimerTable {
        &self.table
    }

    pub fn install(&mut self) -> Result<()> {
        if self.state != MuxState::Idle {
            return Err(CoachError::ScheduleInstallFailed(
                "table already installed".to_string(),
            ));
        }
        self.facility.install(&self.table.render())?;
        self.state = MuxState::Installed;
        info!(
            entries = self.table.lines.len(),
            env = self.table.env.len(),
            "timer table installed"
        );
        Ok(())
    }

    /// Hand control to the facility. Only ever returns an error.
    pub fn run(&mut self) -> Result<Infallible> {
        if self.state != MuxState::Installed {
            return Err(CoachError::ScheduleInstallFailed(
                "run requested before install".to_string(),
            ));
        }
        self.state = MuxState::Running;
        info!("timer facility running");
        let err = match self.facility.run() {
            Ok(()) => CoachError::TimerExited("timer facility stopped".to_string()),
            Err(e @ CoachError::TimerExited(_)) => e,
            Err(other) => CoachError::TimerExited(other.to_string()),
        };
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
