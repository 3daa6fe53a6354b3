use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;

use super::{ndjson, AppState};
use crate::chat::ChatStats;
use crate::geo::{Feature, Point, Rectangle, RouteSummary};
use crate::route::RouteError;
use crate::service::ServiceError;

/// A [`ServiceError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Inbound(_) => StatusCode::BAD_REQUEST,
            ServiceError::Route(RouteError::InvalidState { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Chat(_) | ServiceError::OutboundClosed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

pub async fn get_feature(State(state): State<AppState>, Json(point): Json<Point>) -> Json<Feature> {
    Json(state.service.get_feature(point))
}

pub async fn list_features(State(state): State<AppState>, Json(rect): Json<Rectangle>) -> Response {
    let lines = state
        .service
        .list_features(rect)
        .map(|feature| ndjson::encode_line(&feature));
    (
        [(header::CONTENT_TYPE, ndjson::CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response()
}

pub async fn record_route(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<RouteSummary>, ApiError> {
    let points = ndjson::decode::<Point, _, _>(body.into_data_stream());
    let cancel = state.shutdown.child_token();
    let summary = state.service.record_route(points, cancel).await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub features: usize,
    pub named_features: usize,
    pub chat: ChatStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let store = state.service.store();
    Json(HealthReport {
        status: "ok",
        features: store.len(),
        named_features: store.named_count(),
        chat: state.service.notes().stats(),
    })
}
