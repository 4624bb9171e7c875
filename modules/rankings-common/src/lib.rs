pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use auth::SharedSecret;
pub use catalog::{Team, TEAMS, TEAM_COUNT};
pub use config::Config;
pub use error::{RankingError, Result};
pub use file_config::{FetchSettings, JobSpec, JobsConfig};
pub use types::*;
