use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserlessError>;

#[derive(Debug, Error)]
pub enum BrowserlessError {
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP round trip to Browserless itself exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Browserless answered, but the target page itself did not load: DNS or
    /// TLS failure, refused connection, or a non-2xx document.
    #[error("Navigation to {url} failed: {}", describe_status(.status))]
    Navigation { url: String, status: Option<u16> },
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("target responded {code}"),
        None => "no response from target".to_string(),
    }
}

impl From<reqwest::Error> for BrowserlessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrowserlessError::Timeout(err.to_string())
        } else {
            BrowserlessError::Network(err.to_string())
        }
    }
}
