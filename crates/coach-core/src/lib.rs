pub mod capability;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod error;
pub mod io;
pub mod message;
pub mod paths;
pub mod period;
pub mod prompt;
pub mod schedule;
pub mod signature;
pub mod slack;
pub mod store;
pub mod topic;
pub mod votes;

pub use error::{CoachError, Result};
