use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TEAM_COUNT;
use crate::error::RankingError;

// --- Identifiers ---

/// One of the 32 catalog entries. Only constructible inside `1..=32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TeamId(pub(crate) u8);

impl TeamId {
    pub fn new(id: i64) -> Option<Self> {
        (1..=TEAM_COUNT as i64)
            .contains(&id)
            .then(|| TeamId(id as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = TeamId> {
        (1..=TEAM_COUNT as u8).map(TeamId)
    }
}

impl TryFrom<i64> for TeamId {
    type Error = RankingError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        TeamId::new(id)
            .ok_or_else(|| RankingError::Validation(format!("team id {id} outside 1..={TEAM_COUNT}")))
    }
}

impl From<TeamId> for i64 {
    fn from(id: TeamId) -> Self {
        i64::from(id.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! plain_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

plain_id!(
    /// A publisher whose rankings are ingested.
    SourceId(i32)
);
plain_id!(
    /// Ranking cycle. No calendar meaning.
    Week(i32)
);
plain_id!(ObservationId(i64));

// --- Records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
}

/// One source's rank for one team in one week.
///
/// `rank` is whatever the upstream produced; it is usually `1..=32` but the
/// store keeps out-of-range and duplicate values as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub id: ObservationId,
    pub team_id: TeamId,
    pub source_id: SourceId,
    pub week: Week,
    pub rank: i32,
    pub is_outlier: bool,
    pub outlier_approved: bool,
    pub updated_at: DateTime<Utc>,
}

/// Untyped row as it comes off the wire from a store.
#[derive(Debug, Clone)]
pub struct RawObservation {
    pub id: i64,
    pub team_id: i64,
    pub source_id: i32,
    pub week: i32,
    pub rank: i32,
    pub is_outlier: bool,
    pub outlier_approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RawObservation> for Observation {
    type Error = RankingError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let team_id = TeamId::try_from(raw.team_id)
            .map_err(|e| RankingError::MalformedRow(format!("ranking {}: {e}", raw.id)))?;
        if raw.outlier_approved && raw.is_outlier {
            return Err(RankingError::MalformedRow(format!(
                "ranking {} is both approved and flagged",
                raw.id
            )));
        }
        Ok(Observation {
            id: ObservationId(raw.id),
            team_id,
            source_id: SourceId(raw.source_id),
            week: Week(raw.week),
            rank: raw.rank,
            is_outlier: raw.is_outlier,
            outlier_approved: raw.outlier_approved,
            updated_at: raw.updated_at,
        })
    }
}

/// An `(team, rank)` pair produced by extraction, before it becomes an Observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub team_id: TeamId,
    pub rank: i32,
}

// --- Display-side views ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationView {
    pub id: ObservationId,
    pub source: String,
    pub rank: i32,
    pub is_outlier: bool,
    pub outlier_approved: bool,
}

/// All of one week's observations for one team plus its consensus score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamConsensus {
    pub team_id: TeamId,
    pub name: String,
    pub consensus_score: f64,
    pub source_ranks: Vec<ObservationView>,
}

/// Mean rank rounded to one decimal. Display ordering only; outlier
/// detection uses the median.
pub fn consensus_score(ranks: &[i32]) -> Option<f64> {
    if ranks.is_empty() {
        return None;
    }
    let mean = ranks.iter().map(|&r| f64::from(r)).sum::<f64>() / ranks.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Order by ascending consensus score, ties broken by team id.
pub fn sort_by_consensus(teams: &mut [TeamConsensus]) {
    teams.sort_by(|a, b| {
        a.consensus_score
            .total_cmp(&b.consensus_score)
            .then(a.team_id.cmp(&b.team_id))
    });
}
