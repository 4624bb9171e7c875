//! Test doubles for the ingest pipeline: a canned page fetcher and a scripted
//! inference backend. No network, no model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use rankings_common::{RankingError, Result};

use crate::extractor::{InferenceRequest, RankedTeam, RankingInference, RankingsResponse};
use crate::fetcher::{FetchedPage, PageFetcher};

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Serves canned HTML by URL. Unknown URLs fail like a dead host.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, (String, bool)>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_url(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), (html.to_string(), false));
        self
    }

    /// Serve `html` as a page whose load deadline passed.
    pub fn on_url_partial(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), (html.to_string(), true));
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let (html, soft_timeout) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| RankingError::Fetch(format!("connection refused: {url}")))?;
        Ok(FetchedPage {
            url: url.to_string(),
            html,
            soft_timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// FakeInference
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Reply {
    Rankings(RankingsResponse),
    SchemaViolation(String),
    Unavailable(String),
}

/// Scripted model. Rules match on article text; the first matching rule wins,
/// otherwise the default reply is used. Clones share the call counter.
#[derive(Clone)]
pub struct FakeInference {
    rules: Vec<(String, Reply)>,
    default: Reply,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeInference {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: Reply::Rankings(RankingsResponse { rankings: Vec::new() }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn rankings(pairs: &[(i64, i64)]) -> RankingsResponse {
    RankingsResponse {
        rankings: pairs
            .iter()
            .map(|&(team_id, rank)| RankedTeam { team_id, rank })
            .collect(),
    }
}

impl FakeInference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default reply: these `(team_id, rank)` pairs, in order.
    pub fn respond(mut self, pairs: &[(i64, i64)]) -> Self {
        self.default = Reply::Rankings(rankings(pairs));
        self
    }

    pub fn respond_with(mut self, response: RankingsResponse) -> Self {
        self.default = Reply::Rankings(response);
        self
    }

    /// Default reply is a payload that fails schema validation.
    pub fn violate_schema(mut self, detail: &str) -> Self {
        self.default = Reply::SchemaViolation(detail.to_string());
        self
    }

    pub fn unavailable(mut self, detail: &str) -> Self {
        self.default = Reply::Unavailable(detail.to_string());
        self
    }

    /// Reply with `pairs` when the article contains `needle`.
    pub fn when_article_contains(mut self, needle: &str, pairs: &[(i64, i64)]) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Rankings(rankings(pairs))));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingInference for FakeInference {
    async fn infer(&self, request: &InferenceRequest) -> Result<RankingsResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.article.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default);

        match reply {
            Reply::Rankings(r) => Ok(r.clone()),
            Reply::SchemaViolation(msg) => Err(RankingError::SchemaValidation(msg.clone())),
            Reply::Unavailable(msg) => Err(RankingError::Inference(msg.clone())),
        }
    }
}
