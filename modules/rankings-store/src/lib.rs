//! Durable storage for ranking observations.
//!
//! [`RankStore`] is the persistence port every other component talks to.
//! [`PgRankStore`] is the Postgres implementation; `MemoryRankStore` (behind
//! the `test-support` feature) is an in-process stand-in for tests.

pub mod error;
mod postgres;

#[cfg(any(test, feature = "test-support"))]
mod memory;

pub use error::{Result, StoreError};
pub use postgres::PgRankStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryRankStore;

use std::collections::BTreeMap;

use async_trait::async_trait;

use rankings_common::catalog;
use rankings_common::{
    consensus_score, sort_by_consensus, Observation, ObservationId, ObservationView,
    RawObservation, Source, SourceId, TeamConsensus, TeamId, Week,
};

#[async_trait]
pub trait RankStore: Send + Sync {
    /// Insert or fully overwrite the observation keyed by `(team, source, week)`.
    ///
    /// Always refreshes the timestamp and clears `is_outlier` and
    /// `outlier_approved`, even when `rank` equals the stored value.
    async fn upsert(
        &self,
        team_id: TeamId,
        source_id: SourceId,
        week: Week,
        rank: i32,
    ) -> Result<ObservationId>;

    async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>>;

    /// Every observation for one `(team, week)` group.
    async fn list_observations(&self, team_id: TeamId, week: Week) -> Result<Vec<Observation>>;

    /// `(team, week)` groups holding at least `min_size` observations.
    async fn list_groups(&self, min_size: usize) -> Result<Vec<(TeamId, Week)>>;

    /// Write the outlier flag. A request to flag an approved row is a no-op.
    async fn set_outlier(&self, id: ObservationId, is_outlier: bool) -> Result<()>;

    /// Write the approval. Approving also clears `is_outlier` in the same write.
    async fn set_approved(&self, id: ObservationId, approved: bool) -> Result<()>;

    /// A week's observations grouped by team, ordered by ascending mean rank.
    async fn list_by_week(&self, week: Week) -> Result<Vec<TeamConsensus>>;

    async fn list_distinct_weeks(&self) -> Result<Vec<Week>>;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn upsert_source(&self, source: &Source) -> Result<()>;
}

pub(crate) fn validate(raw: RawObservation) -> Result<Observation> {
    Observation::try_from(raw).map_err(|e| StoreError::MalformedRow(e.to_string()))
}

/// Group `(observation, source name)` pairs into per-team consensus rows.
pub(crate) fn build_consensus(rows: Vec<(Observation, String)>) -> Vec<TeamConsensus> {
    let mut by_team: BTreeMap<TeamId, Vec<(Observation, String)>> = BTreeMap::new();
    for (obs, source) in rows {
        by_team.entry(obs.team_id).or_default().push((obs, source));
    }

    let mut teams: Vec<TeamConsensus> = by_team
        .into_iter()
        .filter_map(|(team_id, mut rows)| {
            rows.sort_by_key(|(obs, _)| obs.source_id);
            let ranks: Vec<i32> = rows.iter().map(|(obs, _)| obs.rank).collect();
            let consensus_score = consensus_score(&ranks)?;
            Some(TeamConsensus {
                team_id,
                name: catalog::team(team_id).name.to_string(),
                consensus_score,
                source_ranks: rows
                    .into_iter()
                    .map(|(obs, source)| ObservationView {
                        id: obs.id,
                        source,
                        rank: obs.rank,
                        is_outlier: obs.is_outlier,
                        outlier_approved: obs.outlier_approved,
                    })
                    .collect(),
            })
        })
        .collect();

    sort_by_consensus(&mut teams);
    teams
}
