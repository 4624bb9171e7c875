use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use browserless_client::{BrowserlessClient, BrowserlessError, ContentOptions};
use rankings_common::{RankingError, Result};

/// Rendered document for one URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    /// The readiness deadline passed; `html` is whatever had loaded by then.
    pub soft_timeout: bool,
}

// --- PageFetcher trait ---

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url` and return its rendered DOM.
    ///
    /// Missing the readiness milestone is not an error; navigation and network
    /// failures are.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// --- Browserless fetcher ---

/// Renders pages through Browserless `/content`.
///
/// Every call is its own browser session on the Browserless side, opened and
/// torn down by that one request, so nothing outlives a job.
pub struct BrowserlessFetcher {
    client: BrowserlessClient,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let options = ContentOptions {
            timeout,
            ..ContentOptions::default()
        };
        let client = BrowserlessClient::with_options(base_url, token, options)
            .map_err(|e| RankingError::Config(e.to_string()))?;
        info!(base_url, timeout_secs = timeout.as_secs(), "Using BrowserlessFetcher");
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RankingError::Fetch(format!("invalid url {url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RankingError::Fetch(format!(
                "only http/https urls are allowed, got {}",
                parsed.scheme()
            )));
        }

        info!(url, fetcher = "browserless", "Fetching page");

        let page = self
            .client
            .content(url)
            .await
            .map_err(|e| fetch_error(url, e))?;

        if page.deadline_exceeded {
            warn!(
                url,
                fetcher = "browserless",
                elapsed_ms = page.elapsed.as_millis() as u64,
                "Page load timed out, reading whatever content is present"
            );
        }

        info!(
            url,
            fetcher = "browserless",
            status = page.target_status,
            bytes = page.html.len(),
            "Fetched page"
        );
        Ok(FetchedPage {
            url: url.to_string(),
            html: page.html,
            soft_timeout: page.deadline_exceeded,
        })
    }
}

/// Every Browserless failure is fatal to the job.
fn fetch_error(url: &str, err: BrowserlessError) -> RankingError {
    match err {
        BrowserlessError::Api { status, message } => {
            RankingError::Fetch(format!("browserless returned {status} for {url}: {message}"))
        }
        BrowserlessError::Navigation { status, .. } => {
            warn!(url, ?status, "Target page did not load");
            RankingError::Fetch(navigation_failure(url, status))
        }
        other => RankingError::Fetch(format!("{url}: {other}")),
    }
}

fn navigation_failure(url: &str, status: Option<u16>) -> String {
    match status {
        Some(code) => format!("{url} responded {code}"),
        None => format!("{url} could not be reached"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_urls_before_any_request() {
        let fetcher =
            BrowserlessFetcher::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("ftp://example.com/rankings").await.unwrap_err();
        assert!(matches!(err, RankingError::Fetch(_)));

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, RankingError::Fetch(_)));
    }

    #[test]
    fn failed_navigation_is_a_fetch_error() {
        let unreachable = BrowserlessError::Navigation {
            url: "https://down.example/pr".into(),
            status: None,
        };
        match fetch_error("https://down.example/pr", unreachable) {
            RankingError::Fetch(msg) => assert!(msg.contains("could not be reached")),
            other => panic!("expected Fetch, got {other:?}"),
        }

        let gone = BrowserlessError::Navigation {
            url: "https://a.example/pr".into(),
            status: Some(410),
        };
        match fetch_error("https://a.example/pr", gone) {
            RankingError::Fetch(msg) => assert!(msg.contains("responded 410")),
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[test]
    fn browserless_api_errors_are_fetch_errors() {
        let err = fetch_error(
            "https://a.example/pr",
            BrowserlessError::Api {
                status: 429,
                message: "too many sessions".into(),
            },
        );
        assert!(matches!(err, RankingError::Fetch(ref m) if m.contains("429")));
    }
}
