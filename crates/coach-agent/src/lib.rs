//! `coach-agent`: text generation backends for the daily coach.
//!
//! Two implementations of [`coach_core::capability::Generate`]:
//!
//! ```text
//! GenerationConfig.backend
//!     │
//!     ├── messages_api ─▶ MessagesClient   POST {api_base}/v1/messages
//!     │
//!     └── cli ──────────▶ CliGenerator     `claude --print`, prompt on stdin
//! ```
//!
//! Both are blocking and carry an explicit timeout, so a hung call can never
//! hold a stream's dedup lock indefinitely.

pub mod client;
pub mod error;
pub mod types;

pub(crate) mod process;


use coach_core::capability::Generate;
use coach_core::config::{GenerationBackend, GenerationConfig};

pub use client::{MessagesClient, API_KEY_ENV};
pub use error::AgentError;
pub use process::CliGenerator;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Build the configured backend. `api_key` is only needed for `messages_api`.
pub fn backend(cfg: &GenerationConfig, api_key: Option<String>) -> Result<Box<dyn Generate>> {
    Ok(match cfg.backend {
        GenerationBackend::MessagesApi => Box::new(MessagesClient::new(cfg, api_key)?),
        GenerationBackend::Cli => Box::new(CliGenerator::from_config(cfg)),
    })
}
