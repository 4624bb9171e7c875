pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, warn};

/// Extra time the HTTP round trip gets on top of the navigation deadline, so
/// a best-attempt render can still ship its DOM back.
const TRANSPORT_GRACE: Duration = Duration::from_secs(30);

/// Status of the target document's main response, as relayed by Browserless.
/// Absent when navigation never produced a response.
pub const TARGET_STATUS_HEADER: &str = "x-response-code";

/// Resource types that never carry article text.
pub const DEFAULT_REJECTED_RESOURCES: &[&str] =
    &["image", "stylesheet", "font", "media", "websocket", "manifest"];

/// Navigation milestone Browserless waits for before serialising the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

/// Options for one `/content` render.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
    pub reject_resource_types: Vec<String>,
    /// Keep going with whatever DOM exists when the milestone is missed.
    pub best_attempt: bool,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::DomContentLoaded,
            timeout: Duration::from_secs(30),
            reject_resource_types: DEFAULT_REJECTED_RESOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            best_attempt: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    reject_resource_types: &'a [String],
    best_attempt: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: WaitUntil,
    timeout: u64,
}

/// Rendered DOM returned by Browserless.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub elapsed: Duration,
    /// HTTP status of the target document.
    pub target_status: u16,
    /// The navigation deadline passed before Browserless answered; `html` is
    /// whatever had arrived by then.
    pub deadline_exceeded: bool,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    options: ContentOptions,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_options(base_url, token, ContentOptions::default())
    }

    pub fn with_options(base_url: &str, token: Option<&str>, options: ContentOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout + TRANSPORT_GRACE)
            .build()
            .map_err(|e| BrowserlessError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            options,
        })
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    fn request_body<'a>(&'a self, url: &'a str) -> ContentRequest<'a> {
        ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: self.options.wait_until,
                timeout: self.options.timeout.as_millis() as u64,
            },
            reject_resource_types: &self.options.reject_resource_types,
            best_attempt: self.options.best_attempt,
        }
    }

    /// Fetch rendered HTML for a URL via the Browserless /content endpoint.
    ///
    /// Each call runs in its own browser session on the Browserless side and is
    /// torn down when the response completes.
    pub async fn content(&self, url: &str) -> Result<RenderedPage> {
        let started = Instant::now();
        debug!(url, timeout_ms = self.options.timeout.as_millis() as u64, "Browserless content request");

        let resp = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(url))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let target_status = check_target(url, resp.headers())?;
        let html = resp.text().await?;
        let elapsed = started.elapsed();
        let deadline_exceeded = elapsed >= self.options.timeout;
        if deadline_exceeded {
            warn!(url, elapsed_ms = elapsed.as_millis() as u64, "Navigation deadline passed, using partial DOM");
        }

        Ok(RenderedPage {
            html,
            elapsed,
            target_status,
            deadline_exceeded,
        })
    }
}

/// With `bestAttempt` Browserless answers 200 even when `goto` itself failed
/// and hands back the browser's error page. Only a 2xx target status counts
/// as a loaded document.
fn check_target(url: &str, headers: &HeaderMap) -> Result<u16> {
    let status = headers
        .get(TARGET_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u16>().ok());

    match status {
        Some(code) if (200..300).contains(&code) => Ok(code),
        status => Err(BrowserlessError::Navigation {
            url: url.to_string(),
            status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_navigation_policy() {
        let client = BrowserlessClient::new("http://browserless:3000/", Some("tok")).unwrap();
        let body = serde_json::to_value(client.request_body("https://example.com/rankings")).unwrap();

        assert_eq!(body["url"], "https://example.com/rankings");
        assert_eq!(body["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(body["gotoOptions"]["timeout"], 30_000);
        assert_eq!(body["bestAttempt"], true);
        let rejected: Vec<&str> = body["rejectResourceTypes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(rejected, DEFAULT_REJECTED_RESOURCES);
    }

    #[test]
    fn endpoint_appends_token_and_trims_slash() {
        let client = BrowserlessClient::new("http://browserless:3000/", Some("tok")).unwrap();
        assert_eq!(client.endpoint(), "http://browserless:3000/content?token=tok");

        let anon = BrowserlessClient::new("http://browserless:3000", None).unwrap();
        assert_eq!(anon.endpoint(), "http://browserless:3000/content");
    }

    fn headers(code: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/html".parse().unwrap());
        if let Some(code) = code {
            headers.insert(TARGET_STATUS_HEADER, code.parse().unwrap());
        }
        headers
    }

    #[test]
    fn target_2xx_is_a_loaded_page() {
        assert_eq!(check_target("https://a.example", &headers(Some("200"))).unwrap(), 200);
        assert_eq!(check_target("https://a.example", &headers(Some("203"))).unwrap(), 203);
    }

    #[test]
    fn missing_target_status_is_a_navigation_failure() {
        let err = check_target("https://down.example", &headers(None)).unwrap_err();
        assert!(matches!(
            err,
            BrowserlessError::Navigation { ref url, status: None } if url == "https://down.example"
        ));
        assert!(err.to_string().contains("no response from target"));

        let err = check_target("https://down.example", &headers(Some("garbage"))).unwrap_err();
        assert!(matches!(err, BrowserlessError::Navigation { status: None, .. }));
    }

    #[test]
    fn target_error_status_is_a_navigation_failure() {
        let err = check_target("https://a.example", &headers(Some("404"))).unwrap_err();
        assert!(matches!(err, BrowserlessError::Navigation { status: Some(404), .. }));

        let err = check_target("https://a.example", &headers(Some("502"))).unwrap_err();
        assert!(err.to_string().contains("target responded 502"));
    }

    #[test]
    fn wait_until_serialises_to_puppeteer_names() {
        assert_eq!(serde_json::to_value(WaitUntil::Load).unwrap(), "load");
        assert_eq!(serde_json::to_value(WaitUntil::NetworkIdle2).unwrap(), "networkidle2");
    }
}
