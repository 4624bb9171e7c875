use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use rankings_common::RankingError;
use rankings_store::StoreError;

/// Handler error mapped onto an HTTP status with a JSON body.
pub struct ApiError(pub RankingError);

impl From<RankingError> for ApiError {
    fn from(err: RankingError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RankingError::Unauthorized => StatusCode::UNAUTHORIZED,
            RankingError::NotFound(_) => StatusCode::NOT_FOUND,
            RankingError::Validation(_) => StatusCode::BAD_REQUEST,
            other => {
                warn!(error = %other, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal error".to_string()
        } else {
            self.0.to_string()
        };
        (
            status,
            Json(serde_json::json!({"success": false, "message": message})),
        )
            .into_response()
    }
}
