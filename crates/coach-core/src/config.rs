use crate::error::{CoachError, Result};
use crate::schedule::{self, ScheduleEntry};
use crate::signature::DEFAULT_REPLAY_WINDOW_SECS;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SlackConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlackMode {
    /// `chat.postMessage` with a bot token; returns a message id.
    #[default]
    Bot,
    /// Incoming webhook URL; no message id comes back.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub mode: SlackMode,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    #[serde(default = "default_slack_timeout")]
    pub timeout_secs: u64,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_slack_timeout() -> u64 {
    10
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            mode: SlackMode::default(),
            api_base: default_slack_api_base(),
            timeout_secs: default_slack_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationBackend {
    #[default]
    MessagesApi,
    Cli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub backend: GenerationBackend,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,
    /// Program for the `cli` backend.
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    450
}

fn default_temperature() -> f32 {
    0.4
}

fn default_generation_timeout() -> u64 {
    60
}

fn default_generation_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_program() -> String {
    "claude".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["--print".to_string()]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            api_base: default_generation_api_base(),
            program: default_program(),
            args: default_program_args(),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub id: String,
    pub channel: String,
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
    #[serde(default = "default_role_prompt")]
    pub role_prompt: String,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default = "default_poll_size")]
    pub poll_size: usize,
}

fn default_title_prefix() -> String {
    "Daily Postgres Coach".to_string()
}

fn default_role_prompt() -> String {
    "You are an expert Postgres database administrator and educator.".to_string()
}

fn default_topics() -> Vec<String> {
    [
        "sargable date predicates",
        "avoiding extract() in WHERE clauses",
        "composite indexes for join+filter",
        "efficient group-by month/year",
        "pg_trgm for LIKE/regex",
        "VACUUM/ANALYZE and planner stats",
        "sort/aggregate spill and work_mem",
        "partial indexes and selective predicates",
        "CTEs vs subqueries performance",
        "Heap Only Tuples (HOT) updates",
        "Index-only scans",
        "BRIN indexes for time-series",
        "JSONB indexing and query performance",
        "EXPLAIN ANALYZE interpretation",
        "Connection pooling importance",
        "Postgres lock monitoring",
        "Autovacuum tuning",
        "Partitioning strategies",
        "Lateral joins",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_poll_size() -> usize {
    3
}

impl StreamConfig {
    pub fn new(id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            title_prefix: default_title_prefix(),
            role_prompt: default_role_prompt(),
            topics: default_topics(),
            poll_size: default_poll_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_replay_window")]
    pub replay_window_secs: i64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_replay_window() -> i64 {
    DEFAULT_REPLAY_WINDOW_SECS
}

fn default_max_concurrent() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            replay_window_secs: default_replay_window(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/state")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            state_dir: default_state_dir(),
            slack: SlackConfig::default(),
            generation: GenerationConfig::default(),
            streams: Vec::new(),
            schedules: Vec::new(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoachError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Load and reject any configuration with error-level findings.
    /// Returns the remaining warnings for the caller to log.
    pub fn load_valid(path: &Path) -> Result<(Self, Vec<ConfigWarning>)> {
        let cfg = Self::load(path)?;
        let warnings = cfg.ensure_valid()?;
        Ok((cfg, warnings))
    }

    pub fn ensure_valid(&self) -> Result<Vec<ConfigWarning>> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .validate()
            .into_iter()
            .partition(|w| w.level == WarnLevel::Error);
        if !errors.is_empty() {
            let joined: Vec<String> = errors.into_iter().map(|w| w.message).collect();
            return Err(CoachError::Config(joined.join("; ")));
        }
        Ok(warnings)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| CoachError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn stream(&self, id: &str) -> Result<&StreamConfig> {
        self.streams
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CoachError::UnknownStream(id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.tz().is_err() {
            error(format!("unknown timezone '{}'", self.timezone));
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if stream.id.trim().is_empty() {
                error("stream with an empty id".to_string());
            } else if crate::paths::validate_key(&stream.id).is_err() {
                error(format!("stream id '{}' is not a valid state key", stream.id));
            }
            if !seen.insert(stream.id.as_str()) {
                error(format!("duplicate stream id '{}'", stream.id));
            }
            if stream.channel.trim().is_empty() {
                error(format!("stream '{}' has an empty channel", stream.id));
            }
            if stream.topics.is_empty() {
                error(format!("stream '{}' has no topics", stream.id));
            }
        }

        for entry in &self.schedules {
            if let Err(e) = schedule::validate_cron(&entry.cron) {
                error(e.to_string());
            }
            if entry.command.trim().is_empty() {
                error(format!("schedule '{}' has an empty command", entry.cron));
            }
        }

        if self.generation.timeout_secs == 0 {
            error("generation.timeout_secs must be greater than zero".to_string());
        }
        if self.slack.timeout_secs == 0 {
            error("slack.timeout_secs must be greater than zero".to_string());
        }
        if self.server.replay_window_secs <= 0 {
            error("server.replay_window_secs must be greater than zero".to_string());
        }
        if self.server.max_concurrent_requests == 0 {
            error("server.max_concurrent_requests must be greater than zero".to_string());
        }

        let mut seen_schedules = HashSet::new();
        for entry in &self.schedules {
            if !seen_schedules.insert((entry.cron.trim(), entry.command.trim())) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "schedule '{} {}' is listed more than once",
                        entry.cron, entry.command
                    ),
                });
            }
        }

        if self.server.replay_window_secs > DEFAULT_REPLAY_WINDOW_SECS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "server.replay_window_secs={} is wider than the platform's {}s",
                    self.server.replay_window_secs, DEFAULT_REPLAY_WINDOW_SECS
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
