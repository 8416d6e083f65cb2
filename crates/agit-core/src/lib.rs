pub mod agent;
pub mod agit;
pub mod aider_config;
pub mod assistants;
pub mod commits;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod ids;
pub mod pagination;
pub mod runs;
pub mod threads;
pub mod unified_diff;

pub mod types;

pub use crate::agent::{Agent, AgentOutcome, AgentRequest, CommandAgent};
pub use crate::agit::Agit;
pub use crate::config::Settings;
pub use crate::error::AgitError;
