use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::{AlertDraft, AlertError, AlertService, AlertStatus};
use crate::auth::AuthUser;

// POST /alerts
pub async fn create_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<AlertDraft>,
) -> Result<Response, AlertError> {
    let alert = service.create(user.id, draft).await?;
    tracing::Span::current()
        .record("table", "alerts")
        .record("action", "create_alert")
        .record("user_id", user.id);
    Ok((StatusCode::CREATED, Json(alert)).into_response())
}

// GET /alerts/:id
pub async fn get_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Path(alert_id): Path<Uuid>,
) -> Result<Response, AlertError> {
    let alert = service.get(alert_id).await?;
    Ok((StatusCode::OK, Json(alert)).into_response())
}

// GET /alerts
pub async fn list_alerts(
    Extension(service): Extension<Arc<AlertService>>,
) -> Result<Response, AlertError> {
    let alerts = service.list_all().await?;
    Ok((StatusCode::OK, Json(alerts)).into_response())
}

// PUT /alerts/:id
pub async fn update_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
    Json(patch): Json<AlertDraft>,
) -> Result<Response, AlertError> {
    let alert = service.update(alert_id, user.id, patch).await?;
    tracing::Span::current()
        .record("table", "alerts")
        .record("action", "update_alert")
        .record("user_id", user.id);
    Ok((StatusCode::OK, Json(alert)).into_response())
}

// DELETE /alerts/:id
pub async fn delete_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
) -> Result<Response, AlertError> {
    service.delete(alert_id, user.id).await?;
    tracing::Span::current()
        .record("table", "alerts")
        .record("action", "delete_alert")
        .record("user_id", user.id);
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Alert deleted"})),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

// PATCH /alerts/:id/status
pub async fn update_alert_status(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Response, AlertError> {
    let status = AlertStatus::parse(&payload.status)?;
    let alert = service.update_status(alert_id, user.id, status).await?;
    Ok((StatusCode::OK, Json(alert)).into_response())
}

fn default_radius_km() -> f64 {
    crate::geo::NOTIFY_RADIUS_KM
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_radius_km")]
    radius: f64,
}

// GET /alerts/nearby?latitude=..&longitude=..&radius=..
pub async fn list_nearby_alerts(
    Extension(service): Extension<Arc<AlertService>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Response, AlertError> {
    let alerts = service
        .list_nearby(params.latitude, params.longitude, params.radius)
        .await?;
    Ok((StatusCode::OK, Json(alerts)).into_response())
}

// GET /alerts/mine
pub async fn list_my_alerts(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, AlertError> {
    let alerts = service.list_by_owner(user.id).await?;
    Ok((StatusCode::OK, Json(alerts)).into_response())
}

// GET /alerts/user/:id
pub async fn list_user_alerts(
    Extension(service): Extension<Arc<AlertService>>,
    Path(user_id): Path<i32>,
) -> Result<Response, AlertError> {
    let alerts = service.list_by_owner(user_id).await?;
    Ok((StatusCode::OK, Json(alerts)).into_response())
}
