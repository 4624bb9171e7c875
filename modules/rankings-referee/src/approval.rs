use std::sync::Arc;

use tracing::{info, warn};

use rankings_common::{ObservationId, RankingError, Result, SharedSecret};
use rankings_store::RankStore;

/// Human override for a single flagged observation.
///
/// The approval holds until the observation's value is next written, by any
/// path; the store clears it on every upsert.
#[derive(Clone)]
pub struct ApprovalGate {
    store: Arc<dyn RankStore>,
    secret: SharedSecret,
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn RankStore>, secret: SharedSecret) -> Self {
        Self { store, secret }
    }

    /// Approve observation `id`. Nothing is written unless `credential` matches.
    pub async fn approve(&self, id: ObservationId, credential: &str) -> Result<()> {
        if let Err(e) = self.secret.verify(credential) {
            warn!(ranking_id = %id, "Rejected approval with bad credential");
            return Err(e);
        }

        let existing = self
            .store
            .get_observation(id)
            .await?
            .ok_or_else(|| RankingError::NotFound(format!("ranking {id}")))?;

        self.store.set_approved(id, true).await?;
        info!(
            ranking_id = %id,
            team_id = %existing.team_id,
            source_id = %existing.source_id,
            week = %existing.week,
            rank = existing.rank,
            "Outlier approved"
        );
        Ok(())
    }
}
