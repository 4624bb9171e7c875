use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::{AiError, OpenAi};
use rankings_common::catalog::{self, TEAM_COUNT};
use rankings_common::{RankEntry, RankingError, Result, TeamId};

pub const SCHEMA_NAME: &str = "nfl_rankings";

/// One row of the model's answer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RankedTeam {
    /// Catalog id of the team, 1-32 only.
    pub team_id: i64,
    /// Position this publisher gives the team, 1-32 only.
    pub rank: i64,
}

/// The full extraction response from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RankingsResponse {
    pub rankings: Vec<RankedTeam>,
}

/// Everything the model sees for one article.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub instructions: String,
    pub article: String,
}

// --- RankingInference trait ---

#[async_trait]
pub trait RankingInference: Send + Sync {
    /// Run one structured-output call.
    ///
    /// A reply that does not fit [`RankingsResponse`] is
    /// [`RankingError::SchemaValidation`]; transport failures are
    /// [`RankingError::Inference`].
    async fn infer(&self, request: &InferenceRequest) -> Result<RankingsResponse>;
}

/// OpenAI structured outputs under a strict schema, temperature 0.
pub struct OpenAiInference {
    client: OpenAi,
}

impl OpenAiInference {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: OpenAi::new(api_key, model).with_timeout(timeout),
        }
    }
}

#[async_trait]
impl RankingInference for OpenAiInference {
    async fn infer(&self, request: &InferenceRequest) -> Result<RankingsResponse> {
        self.client
            .extract::<RankingsResponse>(
                SCHEMA_NAME,
                request.instructions.as_str(),
                request.article.as_str(),
            )
            .await
            .map_err(|e| match e {
                AiError::Parse(msg) => RankingError::SchemaValidation(msg),
                other => RankingError::Inference(other.to_string()),
            })
    }
}

/// System prompt: task, catalog map, and the disambiguation rules.
pub fn extraction_instructions() -> String {
    format!(
        r###"You extract the official 1-32 NFL power rankings list from a Markdown article.

## Team Catalog (id: Name (aliases))
Report teams by numeric id from this map only.

{catalog}
## How to read the article
1. Find the sequence. Look for a list running 1, 2, 3 ... 32 and read ranks from it. Isolated numbers elsewhere in the text are not ranks.
2. Records are not ranks. "10-2" is a win-loss record; ignore it. "1.", "#1", and "Rank 1" are list markers; keep them.
3. A number in parentheses next to the rank is usually last week's rank. "1 (2) Chiefs" means rank 1.
4. Prose is not the list. "The Chiefs (1) beat the Bills (2)" is narrative; ignore it. "## 1. Kansas City Chiefs" is a header or list item; use it.
5. Publishers format differently. "1 (1): Eagles", "#1. Rams", and "Rank 1 1 Rams Rams" all mean one team at rank 1.

## Output
- Return exactly 32 unique teams, each with one integer rank.
- If two teams seem to share a rank, prefer the one formatted as a header or list item.
- Put the answer in the `rankings` list.
"###,
        catalog = catalog::map_text()
    )
}

/// Validated result of one extraction.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entries: Vec<RankEntry>,
    pub dropped_out_of_range: usize,
    pub dropped_duplicates: usize,
}

/// Filter the model's answer down to known teams, one entry each.
///
/// Out-of-range team ids are dropped; on a repeated team the first entry wins.
pub fn sanitize(response: RankingsResponse) -> Extraction {
    let mut out = Extraction::default();
    let mut seen = HashSet::new();

    for item in response.rankings {
        let Some(team_id) = TeamId::new(item.team_id) else {
            warn!(team_id = item.team_id, rank = item.rank, "Dropping out-of-range team id");
            out.dropped_out_of_range += 1;
            continue;
        };
        let Ok(rank) = i32::try_from(item.rank) else {
            warn!(%team_id, rank = item.rank, "Dropping rank that does not fit a column");
            out.dropped_out_of_range += 1;
            continue;
        };
        if !seen.insert(team_id) {
            warn!(%team_id, rank, "Duplicate team in extraction, keeping first");
            out.dropped_duplicates += 1;
            continue;
        }
        out.entries.push(RankEntry { team_id, rank });
    }

    out
}

/// Turns article text into validated `(team, rank)` entries.
pub struct RankExtractor {
    inference: Box<dyn RankingInference>,
    instructions: String,
}

impl RankExtractor {
    pub fn new(inference: Box<dyn RankingInference>) -> Self {
        Self {
            inference,
            instructions: extraction_instructions(),
        }
    }

    pub async fn extract(&self, article: &str, url: &str) -> Result<Extraction> {
        let request = InferenceRequest {
            instructions: self.instructions.clone(),
            article: format!("Source URL: {url}\n\n{article}"),
        };

        let response = self.inference.infer(&request).await?;
        let raw = response.rankings.len();
        let extraction = sanitize(response);

        if extraction.entries.len() < TEAM_COUNT {
            warn!(
                url,
                teams = extraction.entries.len(),
                expected = TEAM_COUNT,
                "Under-extraction: fewer teams than the league has"
            );
        }

        info!(
            url,
            raw,
            kept = extraction.entries.len(),
            dropped_out_of_range = extraction.dropped_out_of_range,
            dropped_duplicates = extraction.dropped_duplicates,
            "Extraction complete"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::StructuredOutput;

    fn ranked(team_id: i64, rank: i64) -> RankedTeam {
        RankedTeam { team_id, rank }
    }

    #[test]
    fn sanitize_drops_unknown_team_ids() {
        let extraction = sanitize(RankingsResponse {
            rankings: vec![ranked(16, 1), ranked(33, 2), ranked(0, 3), ranked(-4, 4)],
        });
        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].team_id.get(), 16);
        assert_eq!(extraction.dropped_out_of_range, 3);
    }

    #[test]
    fn sanitize_keeps_first_of_duplicates() {
        let extraction = sanitize(RankingsResponse {
            rankings: vec![ranked(16, 1), ranked(4, 2), ranked(16, 7)],
        });
        assert_eq!(extraction.entries.len(), 2);
        assert_eq!(extraction.entries[0].rank, 1);
        assert_eq!(extraction.dropped_duplicates, 1);
    }

    #[test]
    fn sanitize_rejects_ranks_beyond_i32() {
        let extraction = sanitize(RankingsResponse {
            rankings: vec![ranked(5, i64::from(i32::MAX) + 1)],
        });
        assert!(extraction.entries.is_empty());
        assert_eq!(extraction.dropped_out_of_range, 1);
    }

    #[test]
    fn instructions_carry_the_catalog() {
        let text = extraction_instructions();
        assert!(text.contains("1: Arizona Cardinals"));
        assert!(text.contains("32: Washington Commanders"));
    }

    #[test]
    fn schema_is_closed() {
        let schema = RankingsResponse::openai_schema();
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        let item = &schema["properties"]["rankings"]["items"];
        assert_eq!(item["additionalProperties"], serde_json::json!(false));
        assert!(item["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("team_id")));
    }
}
