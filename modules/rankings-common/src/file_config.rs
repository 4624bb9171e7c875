use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RankingError, Result};
use crate::types::{SourceId, Week};

/// TOML-backed job configuration: the week being collected and the list of
/// sources to scrape. Secrets stay in env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    pub week: Week,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSettings {
    /// Render deadline before falling back to whatever DOM has loaded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Hard cap on normalized article text sent to the model.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Upper bound on one inference round trip.
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_chars: default_max_chars(),
            inference_timeout_secs: default_inference_timeout_secs(),
        }
    }
}

/// One publisher to scrape this cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    pub source_id: SourceId,
    /// Blank or missing URLs are skipped.
    #[serde(default)]
    pub url: Option<String>,
}

impl JobSpec {
    pub fn target_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_chars() -> usize {
    60_000
}

fn default_inference_timeout_secs() -> u64 {
    120
}

impl JobsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RankingError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| RankingError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: JobsConfig = toml::from_str(content)
            .map_err(|e| RankingError::Config(format!("Failed to parse jobs config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.source_id) {
                return Err(RankingError::Config(format!(
                    "source_id {} is configured more than once",
                    job.source_id
                )));
            }
            if let Some(url) = job.target_url() {
                let parsed = url::Url::parse(url).map_err(|e| {
                    RankingError::Config(format!("job {}: invalid url {url}: {e}", job.name))
                })?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(RankingError::Config(format!(
                        "job {}: only http/https urls are allowed",
                        job.name
                    )));
                }
            }
        }
        if self.fetch.max_chars == 0 {
            return Err(RankingError::Config("fetch.max_chars must be positive".into()));
        }
        Ok(())
    }
}
