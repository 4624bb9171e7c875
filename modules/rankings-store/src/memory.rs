// In-process RankStore for tests. Same contract as Postgres: unique key,
// flag reset on upsert, approval clears the flag, unknown sources rejected.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use rankings_common::{
    Observation, ObservationId, Source, SourceId, TeamConsensus, TeamId, Week,
};

use crate::error::{Result, StoreError};
use crate::{build_consensus, RankStore};

#[derive(Default)]
struct State {
    next_id: i64,
    rows: BTreeMap<ObservationId, Observation>,
    sources: BTreeMap<SourceId, Source>,
    failing_sources: HashSet<SourceId>,
}

#[derive(Default)]
pub struct MemoryRankStore {
    state: Mutex<State>,
}

impl MemoryRankStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given sources.
    pub fn with_sources(sources: &[(i32, &str)]) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for &(id, name) in sources {
                state.sources.insert(
                    SourceId(id),
                    Source {
                        id: SourceId(id),
                        name: name.to_string(),
                    },
                );
            }
        }
        store
    }

    /// Make every subsequent upsert for `source` fail, as a broken database would.
    pub fn fail_writes_for(&self, source: SourceId) {
        self.lock().failing_sources.insert(source);
    }

    /// Every stored observation, ordered by id.
    pub fn snapshot(&self) -> Vec<Observation> {
        self.lock().rows.values().cloned().collect()
    }

    /// Lookup by natural key.
    pub fn find(&self, team_id: TeamId, source_id: SourceId, week: Week) -> Option<Observation> {
        self.lock()
            .rows
            .values()
            .find(|o| o.team_id == team_id && o.source_id == source_id && o.week == week)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RankStore for MemoryRankStore {
    async fn upsert(
        &self,
        team_id: TeamId,
        source_id: SourceId,
        week: Week,
        rank: i32,
    ) -> Result<ObservationId> {
        let mut state = self.lock();
        if state.failing_sources.contains(&source_id) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        if !state.sources.contains_key(&source_id) {
            return Err(StoreError::UnknownSource(source_id.0));
        }

        let existing = state
            .rows
            .values_mut()
            .find(|o| o.team_id == team_id && o.source_id == source_id && o.week == week);

        if let Some(obs) = existing {
            obs.rank = rank;
            obs.is_outlier = false;
            obs.outlier_approved = false;
            obs.updated_at = Utc::now();
            return Ok(obs.id);
        }

        state.next_id += 1;
        let id = ObservationId(state.next_id);
        state.rows.insert(
            id,
            Observation {
                id,
                team_id,
                source_id,
                week,
                rank,
                is_outlier: false,
                outlier_approved: false,
                updated_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>> {
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn list_observations(&self, team_id: TeamId, week: Week) -> Result<Vec<Observation>> {
        let mut rows: Vec<Observation> = self
            .lock()
            .rows
            .values()
            .filter(|o| o.team_id == team_id && o.week == week)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.source_id);
        Ok(rows)
    }

    async fn list_groups(&self, min_size: usize) -> Result<Vec<(TeamId, Week)>> {
        let mut counts: BTreeMap<(Week, TeamId), usize> = BTreeMap::new();
        for obs in self.lock().rows.values() {
            *counts.entry((obs.week, obs.team_id)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .filter(|(_, n)| *n >= min_size)
            .map(|((week, team), _)| (team, week))
            .collect())
    }

    async fn set_outlier(&self, id: ObservationId, is_outlier: bool) -> Result<()> {
        let mut state = self.lock();
        let obs = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ranking {id}")))?;
        if !(obs.outlier_approved && is_outlier) {
            obs.is_outlier = is_outlier;
        }
        Ok(())
    }

    async fn set_approved(&self, id: ObservationId, approved: bool) -> Result<()> {
        let mut state = self.lock();
        let obs = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ranking {id}")))?;
        obs.outlier_approved = approved;
        if approved {
            obs.is_outlier = false;
        }
        Ok(())
    }

    async fn list_by_week(&self, week: Week) -> Result<Vec<TeamConsensus>> {
        let state = self.lock();
        let rows = state
            .rows
            .values()
            .filter(|o| o.week == week)
            .filter_map(|o| {
                state
                    .sources
                    .get(&o.source_id)
                    .map(|s| (o.clone(), s.name.clone()))
            })
            .collect();
        Ok(build_consensus(rows))
    }

    async fn list_distinct_weeks(&self) -> Result<Vec<Week>> {
        let weeks: BTreeSet<Week> = self.lock().rows.values().map(|o| o.week).collect();
        Ok(weeks.into_iter().collect())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.lock().sources.values().cloned().collect())
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        self.lock().sources.insert(source.id, source.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i64) -> TeamId {
        TeamId::new(id).unwrap()
    }

    fn store() -> MemoryRankStore {
        MemoryRankStore::with_sources(&[(1, "ESPN"), (2, "NFL.com"), (3, "CBS")])
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_team_source_week() {
        let store = store();
        let a = store.upsert(team(16), SourceId(1), Week(12), 1).await.unwrap();
        let b = store.upsert(team(16), SourceId(1), Week(12), 3).await.unwrap();
        let c = store.upsert(team(16), SourceId(1), Week(13), 2).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.get_observation(a).await.unwrap().unwrap().rank, 3);
    }

    #[tokio::test]
    async fn upsert_resets_both_flags_even_for_same_value() {
        let store = store();
        let id = store.upsert(team(4), SourceId(2), Week(1), 9).await.unwrap();
        store.set_outlier(id, true).await.unwrap();
        store.set_approved(id, true).await.unwrap();

        store.upsert(team(4), SourceId(2), Week(1), 9).await.unwrap();

        let obs = store.get_observation(id).await.unwrap().unwrap();
        assert!(!obs.is_outlier);
        assert!(!obs.outlier_approved);
    }

    #[tokio::test]
    async fn approved_rows_cannot_be_flagged() {
        let store = store();
        let id = store.upsert(team(4), SourceId(2), Week(1), 9).await.unwrap();
        store.set_outlier(id, true).await.unwrap();
        store.set_approved(id, true).await.unwrap();

        let obs = store.get_observation(id).await.unwrap().unwrap();
        assert!(obs.outlier_approved && !obs.is_outlier);

        store.set_outlier(id, true).await.unwrap();
        assert!(!store.get_observation(id).await.unwrap().unwrap().is_outlier);
    }

    #[tokio::test]
    async fn unknown_rows_and_sources_are_errors() {
        let store = store();
        assert!(matches!(
            store.set_approved(ObservationId(99), true).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.upsert(team(1), SourceId(42), Week(1), 1).await,
            Err(StoreError::UnknownSource(42))
        ));
    }

    #[tokio::test]
    async fn groups_respect_min_size() {
        let store = store();
        for source in 1..=3 {
            store.upsert(team(10), SourceId(source), Week(5), source).await.unwrap();
        }
        for source in 1..=2 {
            store.upsert(team(11), SourceId(source), Week(5), source).await.unwrap();
        }

        assert_eq!(store.list_groups(3).await.unwrap(), vec![(team(10), Week(5))]);
        assert_eq!(store.list_groups(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_by_week_orders_by_mean_and_keeps_source_names() {
        let store = store();
        store.upsert(team(1), SourceId(1), Week(2), 5).await.unwrap();
        store.upsert(team(1), SourceId(2), Week(2), 7).await.unwrap();
        store.upsert(team(2), SourceId(1), Week(2), 2).await.unwrap();
        store.upsert(team(2), SourceId(3), Week(2), 3).await.unwrap();
        store.upsert(team(3), SourceId(1), Week(9), 1).await.unwrap();

        let week = store.list_by_week(Week(2)).await.unwrap();
        assert_eq!(week.len(), 2);
        assert_eq!(week[0].name, "Atlanta Falcons");
        assert_eq!(week[0].consensus_score, 2.5);
        assert_eq!(week[0].source_ranks[1].source, "CBS");
        assert_eq!(week[1].consensus_score, 6.0);

        assert_eq!(store.list_distinct_weeks().await.unwrap(), vec![Week(2), Week(9)]);
    }
}
