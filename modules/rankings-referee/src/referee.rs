use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use rankings_common::{catalog, Result};
use rankings_store::RankStore;

/// Distance from the group median at which an observation is an outlier.
pub const OUTLIER_DISTANCE: f64 = 3.0;

/// Groups smaller than this are never judged.
pub const MIN_GROUP_SIZE: usize = 3;

/// Median of `values`; even counts average the two middle values.
pub fn median(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(f64::from(sorted[mid]))
    } else {
        Some((f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0)
    }
}

pub fn is_outlier(rank: i32, median: f64) -> bool {
    (f64::from(rank) - median).abs() >= OUTLIER_DISTANCE
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RefereeReport {
    pub groups_examined: u64,
    /// Groups that shrank below the minimum between listing and reading.
    pub groups_skipped: u64,
    pub flagged: u64,
    /// Previously flagged rows that are back within range.
    pub cleared: u64,
    /// Approved rows left untouched.
    pub approved_kept: u64,
}

impl fmt::Display for RefereeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "groups_examined={} groups_skipped={} flagged={} cleared={} approved_kept={}",
            self.groups_examined, self.groups_skipped, self.flagged, self.cleared, self.approved_kept,
        )
    }
}

/// Full-store median sweep over every `(team, week)` group.
#[derive(Clone)]
pub struct Referee {
    store: Arc<dyn RankStore>,
}

impl Referee {
    pub fn new(store: Arc<dyn RankStore>) -> Self {
        Self { store }
    }

    /// Recompute every group's median and rewrite `is_outlier` on unapproved rows.
    ///
    /// Running it twice over unchanged data writes the same flags.
    pub async fn sweep(&self) -> Result<RefereeReport> {
        let mut report = RefereeReport::default();

        let groups = self.store.list_groups(MIN_GROUP_SIZE).await?;
        info!(groups = groups.len(), "Referee sweep starting");

        for (team_id, week) in groups {
            let observations = self.store.list_observations(team_id, week).await?;
            if observations.len() < MIN_GROUP_SIZE {
                report.groups_skipped += 1;
                continue;
            }
            report.groups_examined += 1;

            let ranks: Vec<i32> = observations.iter().map(|o| o.rank).collect();
            let Some(median) = median(&ranks) else {
                continue;
            };

            for obs in &observations {
                if obs.outlier_approved {
                    report.approved_kept += 1;
                    continue;
                }

                let flag = is_outlier(obs.rank, median);
                self.store.set_outlier(obs.id, flag).await?;

                if flag {
                    report.flagged += 1;
                    warn!(
                        team = catalog::team(team_id).name,
                        %team_id,
                        %week,
                        source_id = %obs.source_id,
                        rank = obs.rank,
                        median,
                        distance = (f64::from(obs.rank) - median).abs(),
                        "Outlier flagged"
                    );
                } else if obs.is_outlier {
                    report.cleared += 1;
                }
            }
        }

        info!(active_outliers = report.flagged, %report, "Referee sweep complete");
        Ok(report)
    }
}
