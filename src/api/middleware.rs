use axum::{
    extract::{Extension, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, AuthUser};

/// Shared JWT signing secret, injected at startup.
#[derive(Clone)]
pub struct JwtSecret(pub Arc<String>);

/// Bearer-token authentication. On success the verified [`AuthUser`] is
/// inserted into request extensions; no database lookup is performed.
pub async fn auth_middleware(
    Extension(secret): Extension<JwtSecret>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if let Some(token) = token {
        if let Ok(claims) = auth::verify_token(token, &secret.0) {
            request.extensions_mut().insert(AuthUser::from(claims));
            return next.run(request).await;
        }
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized"})),
    )
        .into_response()
}
