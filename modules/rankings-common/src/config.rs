use std::env;
use std::path::PathBuf;

use crate::auth::SharedSecret;
use crate::error::{RankingError, Result};

const DEFAULT_JOBS_CONFIG: &str = "rankings.toml";

/// Process configuration loaded from environment variables.
///
/// Holds secrets and deployment-specific values only. Which sources to scrape
/// lives in the TOML [`JobsConfig`](crate::JobsConfig). Nothing here has a
/// baked-in secret default.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Inference
    pub openai_api_key: String,

    // Rendering
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    // Operator surface
    pub admin_secret: Option<SharedSecret>,
    pub api_host: String,
    pub api_port: u16,

    pub jobs_config_path: PathBuf,
}

impl Config {
    /// Everything the ingestion batch needs.
    pub fn ingest_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            openai_api_key: required_env("OPENAI_API_KEY")?,
            browserless_url: required_env("BROWSERLESS_URL")?,
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
            admin_secret: None,
            api_host: String::new(),
            api_port: 0,
            jobs_config_path: jobs_config_path(),
        })
    }

    /// The referee only touches the store.
    pub fn referee_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            openai_api_key: String::new(),
            browserless_url: String::new(),
            browserless_token: None,
            admin_secret: None,
            api_host: String::new(),
            api_port: 0,
            jobs_config_path: jobs_config_path(),
        })
    }

    /// The operator API: store plus the shared secret.
    pub fn api_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| RankingError::Config("API_PORT must be a number".into()))?;
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            openai_api_key: String::new(),
            browserless_url: String::new(),
            browserless_token: None,
            admin_secret: Some(SharedSecret::new(required_env("ADMIN_PASSWORD")?)?),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port,
            jobs_config_path: jobs_config_path(),
        })
    }

    /// Log which settings are present without printing secrets.
    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", redact_url(&self.database_url));
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  BROWSERLESS_URL: {}", or_unset(&self.browserless_url));
        tracing::info!(
            "  BROWSERLESS_TOKEN: {}",
            self.browserless_token.as_deref().map(preview).unwrap_or_else(|| "<not set>".into())
        );
        tracing::info!(
            "  ADMIN_PASSWORD: {}",
            if self.admin_secret.is_some() { "<set>" } else { "<not set>" }
        );
        tracing::info!("  RANKINGS_CONFIG: {}", self.jobs_config_path.display());
    }
}

fn required_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RankingError::Config(format!("{key} environment variable is required"))),
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn jobs_config_path() -> PathBuf {
    optional_env("RANKINGS_CONFIG")
        .unwrap_or_else(|| DEFAULT_JOBS_CONFIG.to_string())
        .into()
}

fn preview(val: &str) -> String {
    if val.is_empty() {
        return "<not set>".to_string();
    }
    let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.len())
}

fn or_unset(val: &str) -> &str {
    if val.is_empty() {
        "<not set>"
    } else {
        val
    }
}

/// Drop the password from a connection string before logging it.
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => preview(raw),
    }
}
