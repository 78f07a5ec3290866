use coach_core::CoachError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<AgentError> for CoachError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::MissingCredential(_) => CoachError::Config(e.to_string()),
            other => CoachError::GenerationFailed(other.to_string()),
        }
    }
}
