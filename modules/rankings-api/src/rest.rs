use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{info, warn};

use rankings_common::catalog::{self, TEAM_COUNT};
use rankings_common::{ObservationId, RankingError, SourceId, TeamId, Week};

use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

// --- Request bodies ---

#[derive(Deserialize)]
pub struct WeekQuery {
    week: Option<i32>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
pub struct SourceRank {
    source_id: i32,
    value: Option<i64>,
}

#[derive(Deserialize)]
pub struct SubmitRankingsRequest {
    team_id: i64,
    week: i32,
    ranks: Vec<SourceRank>,
    password: String,
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    ranking_id: i64,
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordOnly {
    password: String,
}

// --- Read side ---

pub async fn api_rankings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WeekQuery>,
) -> ApiResult<impl IntoResponse> {
    let week = Week(params.week.unwrap_or(1));
    let teams = state.store.list_by_week(week).await?;
    Ok(Json(teams))
}

pub async fn api_weeks(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_distinct_weeks().await?))
}

pub async fn api_teams() -> impl IntoResponse {
    Json(catalog::list_teams())
}

pub async fn api_sources(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_sources().await?))
}

// --- Operator writes ---

pub async fn api_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    if state.secret.matches(&body.password) {
        Json(serde_json::json!({"success": true})).into_response()
    } else {
        warn!("Failed login attempt");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"success": false, "message": "Invalid Password"})),
        )
            .into_response()
    }
}

/// Manual edit: one team, one week, any number of sources. Goes through the
/// same upsert as ingestion, so every written row loses its flags.
///
/// Every entry is checked before the first write; a rejected request leaves
/// the store untouched.
pub async fn api_submit_rankings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitRankingsRequest>,
) -> ApiResult<impl IntoResponse> {
    state.secret.verify(&body.password)?;

    let team_id = TeamId::new(body.team_id).ok_or_else(|| {
        RankingError::Validation(format!("unknown team {}", body.team_id))
    })?;

    let mut writes = Vec::new();
    for entry in &body.ranks {
        let Some(value) = entry.value else {
            continue;
        };
        let rank = i32::try_from(value)
            .ok()
            .filter(|r| (1..=TEAM_COUNT as i32).contains(r))
            .ok_or_else(|| {
                RankingError::Validation(format!(
                    "rank {value} for source {} is outside 1-{TEAM_COUNT}",
                    entry.source_id
                ))
            })?;
        writes.push((SourceId(entry.source_id), rank));
    }

    let known: HashSet<SourceId> = state
        .store
        .list_sources()
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if let Some((unknown, _)) = writes.iter().find(|(id, _)| !known.contains(id)) {
        return Err(RankingError::Validation(format!("unknown source {unknown}")).into());
    }

    let week = Week(body.week);
    for &(source_id, rank) in &writes {
        state.store.upsert(team_id, source_id, week, rank).await?;
    }

    info!(%team_id, %week, updated = writes.len(), "Manual rankings submitted");
    Ok(Json(serde_json::json!({"success": true, "updated": writes.len()})))
}

pub async fn api_approve_outlier(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApproveRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .gate
        .approve(ObservationId(body.ranking_id), &body.password)
        .await?;
    Ok(Json(serde_json::json!({"success": true})))
}

pub async fn api_run_referee(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PasswordOnly>,
) -> ApiResult<impl IntoResponse> {
    state.secret.verify(&body.password)?;
    let report = state.referee.sweep().await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use rankings_common::{SharedSecret, SourceId, TeamId, Week};
    use rankings_store::{MemoryRankStore, RankStore};

    use crate::{app, AppState};

    const PASSWORD: &str = "letmein";

    fn router(store: Arc<MemoryRankStore>) -> Router {
        app(AppState::new(store, SharedSecret::new(PASSWORD).unwrap()))
    }

    fn store() -> Arc<MemoryRankStore> {
        Arc::new(MemoryRankStore::with_sources(&[(1, "ESPN"), (2, "NFL.com"), (3, "CBS")]))
    }

    fn team(id: i64) -> TeamId {
        TeamId::new(id).unwrap()
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_check() {
        let response = router(store())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_checks_the_shared_secret() {
        let (status, body) =
            send(router(store()), "POST", "/login", Some(json!({"password": PASSWORD}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) =
            send(router(store()), "POST", "/login", Some(json!({"password": "nope"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid Password");
    }

    #[tokio::test]
    async fn rankings_default_to_week_one_and_order_by_mean() {
        let store = store();
        store.upsert(team(4), SourceId(1), Week(1), 3).await.unwrap();
        store.upsert(team(16), SourceId(1), Week(1), 1).await.unwrap();
        store.upsert(team(16), SourceId(2), Week(1), 2).await.unwrap();
        store.upsert(team(11), SourceId(1), Week(2), 1).await.unwrap();

        let (status, body) = send(router(store.clone()), "GET", "/rankings", None).await;
        assert_eq!(status, StatusCode::OK);
        let teams = body.as_array().unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0]["name"], "Kansas City Chiefs");
        assert_eq!(teams[0]["consensus_score"], 1.5);

        let (_, body) = send(router(store.clone()), "GET", "/rankings?week=2", None).await;
        assert_eq!(body[0]["team_id"], 11);

        let (_, body) = send(router(store), "GET", "/weeks", None).await;
        assert_eq!(body, json!([1, 2]));
    }

    #[tokio::test]
    async fn teams_and_sources() {
        let (_, body) = send(router(store()), "GET", "/teams", None).await;
        assert_eq!(body.as_array().unwrap().len(), 32);
        assert_eq!(body[0]["name"], "Arizona Cardinals");

        let (_, body) = send(router(store()), "GET", "/sources", None).await;
        assert_eq!(body[2]["name"], "CBS");
    }

    #[tokio::test]
    async fn submit_requires_password_and_writes_nothing_without_it() {
        let store = store();
        let body = json!({
            "team_id": 16, "week": 3, "password": "wrong",
            "ranks": [{"source_id": 1, "value": 4}]
        });

        let (status, _) = send(router(store.clone()), "POST", "/submit-rankings", Some(body)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn submit_upserts_and_resets_flags() {
        let store = store();
        let id = store.upsert(team(16), SourceId(1), Week(3), 9).await.unwrap();
        store.set_approved(id, true).await.unwrap();

        let body = json!({
            "team_id": 16, "week": 3, "password": PASSWORD,
            "ranks": [{"source_id": 1, "value": 9}, {"source_id": 2, "value": 2}, {"source_id": 3, "value": null}]
        });
        let (status, resp) = send(router(store.clone()), "POST", "/submit-rankings", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["updated"], 2);
        let obs = store.find(team(16), SourceId(1), Week(3)).unwrap();
        assert!(!obs.outlier_approved);
        assert_eq!(store.find(team(16), SourceId(2), Week(3)).unwrap().rank, 2);
        assert!(store.find(team(16), SourceId(3), Week(3)).is_none());
    }

    #[tokio::test]
    async fn submit_rejects_bad_input() {
        let store = store();
        let out_of_range = json!({
            "team_id": 16, "week": 3, "password": PASSWORD,
            "ranks": [{"source_id": 1, "value": 2}, {"source_id": 2, "value": 33}]
        });
        let (status, _) =
            send(router(store.clone()), "POST", "/submit-rankings", Some(out_of_range)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.snapshot().is_empty());

        let unknown_team = json!({
            "team_id": 40, "week": 3, "password": PASSWORD,
            "ranks": [{"source_id": 1, "value": 2}]
        });
        let (status, _) =
            send(router(store.clone()), "POST", "/submit-rankings", Some(unknown_team)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown_source = json!({
            "team_id": 16, "week": 3, "password": PASSWORD,
            "ranks": [{"source_id": 77, "value": 2}]
        });
        let (status, _) =
            send(router(store), "POST", "/submit-rankings", Some(unknown_source)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_source_late_in_the_list_writes_nothing() {
        let store = store();
        let body = json!({
            "team_id": 16, "week": 3, "password": PASSWORD,
            "ranks": [{"source_id": 1, "value": 2}, {"source_id": 77, "value": 2}]
        });

        let (status, resp) = send(router(store.clone()), "POST", "/submit-rankings", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Validation error: unknown source 77");
        assert!(store.find(team(16), SourceId(1), Week(3)).is_none());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn approve_outlier_flow() {
        let store = store();
        let id = store.upsert(team(16), SourceId(3), Week(12), 9).await.unwrap();
        store.set_outlier(id, true).await.unwrap();

        let (status, _) = send(
            router(store.clone()),
            "POST",
            "/approve-outlier",
            Some(json!({"ranking_id": id.0, "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(store.get_observation(id).await.unwrap().unwrap().is_outlier);

        let (status, _) = send(
            router(store.clone()),
            "POST",
            "/approve-outlier",
            Some(json!({"ranking_id": id.0, "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let obs = store.get_observation(id).await.unwrap().unwrap();
        assert!(obs.outlier_approved && !obs.is_outlier);

        let (status, _) = send(
            router(store),
            "POST",
            "/approve-outlier",
            Some(json!({"ranking_id": 9999, "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn referee_runs_on_demand() {
        let store = store();
        for (source, rank) in [(1, 1), (2, 2), (3, 9)] {
            store.upsert(team(16), SourceId(source), Week(12), rank).await.unwrap();
        }

        let (status, _) = send(
            router(store.clone()),
            "POST",
            "/referee/run",
            Some(json!({"password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(store.snapshot().iter().all(|o| !o.is_outlier));

        let (status, report) = send(
            router(store.clone()),
            "POST",
            "/referee/run",
            Some(json!({"password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["flagged"], 1);
        assert!(store.find(team(16), SourceId(3), Week(12)).unwrap().is_outlier);
    }
}
