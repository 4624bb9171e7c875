// Postgres implementation of the persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use rankings_common::catalog::TEAMS;
use rankings_common::{
    Observation, ObservationId, RawObservation, Source, SourceId, TeamConsensus, TeamId, Week,
};

use crate::error::{Result, StoreError};
use crate::{build_consensus, validate, RankStore};

/// Explicit store handle. Construct once at startup and pass it down.
#[derive(Clone)]
pub struct PgRankStore {
    pool: PgPool,
}

/// A row from the rankings table, before validation.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RankingRow {
    id: i64,
    team_id: i16,
    source_id: i32,
    week_number: i32,
    rank_number: i32,
    is_outlier: bool,
    outlier_approved: bool,
    created_at: DateTime<Utc>,
}

impl From<RankingRow> for RawObservation {
    fn from(row: RankingRow) -> Self {
        RawObservation {
            id: row.id,
            team_id: i64::from(row.team_id),
            source_id: row.source_id,
            week: row.week_number,
            rank: row.rank_number,
            is_outlier: row.is_outlier,
            outlier_approved: row.outlier_approved,
            updated_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RankingWithSourceRow {
    #[sqlx(flatten)]
    ranking: RankingRow,
    source_name: String,
}

const RANKING_COLUMNS: &str = "r.id, r.team_id, r.source_id, r.week_number, r.rank_number, \
                               r.is_outlier, r.outlier_approved, r.created_at";

impl PgRankStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations and seed the team catalog.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        self.seed_teams().await?;
        info!("Rankings schema migrated");
        Ok(())
    }

    async fn seed_teams(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for team in TEAMS.iter() {
            sqlx::query(
                r#"
                INSERT INTO teams (id, name) VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
                "#,
            )
            .bind(i16::from(team.id.get()))
            .bind(team.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn exists(&self, id: ObservationId) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM rankings WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl RankStore for PgRankStore {
    async fn upsert(
        &self,
        team_id: TeamId,
        source_id: SourceId,
        week: Week,
        rank: i32,
    ) -> Result<ObservationId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO rankings (team_id, source_id, rank_number, week_number)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (team_id, source_id, week_number)
            DO UPDATE SET
                rank_number = EXCLUDED.rank_number,
                created_at = now(),
                is_outlier = FALSE,
                outlier_approved = FALSE
            RETURNING id
            "#,
        )
        .bind(i16::from(team_id.get()))
        .bind(source_id.0)
        .bind(rank)
        .bind(week.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unknown_source =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if unknown_source {
                StoreError::UnknownSource(source_id.0)
            } else {
                StoreError::Database(e)
            }
        })?;

        debug!(%team_id, %source_id, %week, rank, id, "Upserted ranking");
        Ok(ObservationId(id))
    }

    async fn get_observation(&self, id: ObservationId) -> Result<Option<Observation>> {
        let row = sqlx::query_as::<_, RankingRow>(&format!(
            "SELECT {RANKING_COLUMNS} FROM rankings r WHERE r.id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| validate(r.into())).transpose()
    }

    async fn list_observations(&self, team_id: TeamId, week: Week) -> Result<Vec<Observation>> {
        let rows = sqlx::query_as::<_, RankingRow>(&format!(
            "SELECT {RANKING_COLUMNS} FROM rankings r \
             WHERE r.team_id = $1 AND r.week_number = $2 \
             ORDER BY r.source_id"
        ))
        .bind(i16::from(team_id.get()))
        .bind(week.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| validate(r.into())).collect()
    }

    async fn list_groups(&self, min_size: usize) -> Result<Vec<(TeamId, Week)>> {
        let rows = sqlx::query_as::<_, (i16, i32)>(
            r#"
            SELECT team_id, week_number
            FROM rankings
            GROUP BY team_id, week_number
            HAVING COUNT(*) >= $1
            ORDER BY week_number, team_id
            "#,
        )
        .bind(min_size as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(team, week)| {
                TeamId::new(i64::from(team))
                    .map(|team_id| (team_id, Week(week)))
                    .ok_or_else(|| StoreError::MalformedRow(format!("team id {team} out of range")))
            })
            .collect()
    }

    async fn set_outlier(&self, id: ObservationId, is_outlier: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rankings SET is_outlier = $2
            WHERE id = $1 AND NOT (outlier_approved AND $2)
            "#,
        )
        .bind(id.0)
        .bind(is_outlier)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && !self.exists(id).await? {
            return Err(StoreError::NotFound(format!("ranking {id}")));
        }
        Ok(())
    }

    async fn set_approved(&self, id: ObservationId, approved: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rankings
            SET outlier_approved = $2,
                is_outlier = CASE WHEN $2 THEN FALSE ELSE is_outlier END
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(approved)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("ranking {id}")));
        }
        Ok(())
    }

    async fn list_by_week(&self, week: Week) -> Result<Vec<TeamConsensus>> {
        let rows = sqlx::query_as::<_, RankingWithSourceRow>(&format!(
            "SELECT {RANKING_COLUMNS}, s.name AS source_name \
             FROM rankings r JOIN sources s ON s.id = r.source_id \
             WHERE r.week_number = $1"
        ))
        .bind(week.0)
        .fetch_all(&self.pool)
        .await?;

        let rows = rows
            .into_iter()
            .map(|row| Ok((validate(row.ranking.into())?, row.source_name)))
            .collect::<Result<Vec<_>>>()?;

        Ok(build_consensus(rows))
    }

    async fn list_distinct_weeks(&self) -> Result<Vec<Week>> {
        let weeks = sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT week_number FROM rankings ORDER BY week_number ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(weeks.into_iter().map(Week).collect())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, (i32, String)>("SELECT id, name FROM sources ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Source { id: SourceId(id), name })
            .collect())
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (id, name) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(source.id.0)
        .bind(&source.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
