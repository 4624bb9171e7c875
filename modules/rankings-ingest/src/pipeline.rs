use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use rankings_common::{JobSpec, JobsConfig, RankingError, Result, Source, SourceId, Week};
use rankings_store::RankStore;

use crate::extractor::RankExtractor;
use crate::fetcher::PageFetcher;
use crate::normalizer;

/// What one job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source_id: SourceId,
    pub week: Week,
    pub extracted: usize,
    pub dropped_out_of_range: usize,
    pub dropped_duplicates: usize,
    pub persisted: usize,
    pub soft_timeout: bool,
}

#[derive(Debug)]
pub enum JobStatus {
    Completed(IngestReport),
    /// No usable URL configured.
    Skipped,
    Failed(RankingError),
}

#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub source_id: SourceId,
    pub status: JobStatus,
}

/// Result of one batch. Individual job failures live here, never in the
/// batch's own return value.
#[derive(Debug)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub week: Week,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Completed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Skipped))
            .count()
    }

    pub fn persisted(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                JobStatus::Completed(r) => r.persisted,
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ingest Run {} (week {}) ===", self.run_id, self.week)?;
        for outcome in &self.outcomes {
            match &outcome.status {
                JobStatus::Completed(r) => writeln!(
                    f,
                    "  {:<20} ok       {} persisted, {} dropped{}",
                    outcome.name,
                    r.persisted,
                    r.dropped_out_of_range + r.dropped_duplicates,
                    if r.soft_timeout { " (soft timeout)" } else { "" }
                )?,
                JobStatus::Skipped => writeln!(f, "  {:<20} skipped  no url", outcome.name)?,
                JobStatus::Failed(e) => writeln!(f, "  {:<20} FAILED   {e}", outcome.name)?,
            }
        }
        write!(
            f,
            "Completed: {}  Skipped: {}  Failed: {}  Rows written: {}",
            self.completed(),
            self.skipped(),
            self.failed(),
            self.persisted()
        )
    }
}

/// Fetch, normalize, extract, persist.
pub struct IngestPipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: RankExtractor,
    store: Arc<dyn RankStore>,
    max_chars: usize,
}

impl IngestPipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: RankExtractor,
        store: Arc<dyn RankStore>,
        max_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            max_chars,
        }
    }

    /// Run one job end to end for `week`.
    pub async fn run_job(&self, job: &JobSpec, week: Week) -> Result<IngestReport> {
        let url = job
            .target_url()
            .ok_or_else(|| RankingError::Validation(format!("job {} has no url", job.name)))?;

        self.store
            .upsert_source(&Source {
                id: job.source_id,
                name: job.name.clone(),
            })
            .await
            .map_err(|e| RankingError::Persistence(e.to_string()))?;

        let page = self.fetcher.fetch(url).await?;
        let article = normalizer::normalize(&page.html, url, self.max_chars)?;
        let extraction = self.extractor.extract(&article.text, url).await?;

        let mut persisted = 0;
        for entry in &extraction.entries {
            self.store
                .upsert(entry.team_id, job.source_id, week, entry.rank)
                .await
                .map_err(|e| {
                    RankingError::Persistence(format!(
                        "{} team {} after {persisted} rows: {e}",
                        job.name, entry.team_id
                    ))
                })?;
            persisted += 1;
        }

        let report = IngestReport {
            source_id: job.source_id,
            week,
            extracted: extraction.entries.len(),
            dropped_out_of_range: extraction.dropped_out_of_range,
            dropped_duplicates: extraction.dropped_duplicates,
            persisted,
            soft_timeout: page.soft_timeout,
        };
        info!(
            job = job.name.as_str(),
            source_id = %job.source_id,
            %week,
            persisted,
            soft_timeout = page.soft_timeout,
            "Job complete"
        );
        Ok(report)
    }

    /// Run every configured job in order. A failing job is logged and recorded;
    /// the rest still run.
    pub async fn run_batch(&self, config: &JobsConfig) -> BatchSummary {
        let run_id = Uuid::new_v4();
        info!(%run_id, week = %config.week, jobs = config.jobs.len(), "Ingest batch starting");

        let mut outcomes = Vec::with_capacity(config.jobs.len());
        for job in &config.jobs {
            let status = if job.target_url().is_none() {
                warn!(job = job.name.as_str(), "No url configured, skipping");
                JobStatus::Skipped
            } else {
                match self.run_job(job, config.week).await {
                    Ok(report) => JobStatus::Completed(report),
                    Err(e) => {
                        error!(%run_id, job = job.name.as_str(), error = %e, "Job failed");
                        JobStatus::Failed(e)
                    }
                }
            };
            outcomes.push(JobOutcome {
                name: job.name.clone(),
                source_id: job.source_id,
                status,
            });
        }

        let summary = BatchSummary {
            run_id,
            week: config.week,
            outcomes,
        };
        info!(
            %run_id,
            completed = summary.completed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Ingest batch finished"
        );
        summary
    }
}
