use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("state store unavailable at {path}: {reason}")]
    StoreUnavailable { path: String, reason: String },

    #[error("invalid state key '{0}': must be alphanumeric with '-', '_' or '.'")]
    InvalidKey(String),

    #[error("unknown stream: {0}")]
    UnknownStream(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("invalid schedule '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("schedule install failed: {0}")]
    ScheduleInstallFailed(String),

    #[error("timer facility exited: {0}")]
    TimerExited(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoachError>;
