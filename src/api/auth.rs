use crate::api::middleware::JwtSecret;
use crate::auth;
use crate::entities::customer;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use tracing::field::display;

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    age: i32,
    gender: String,
}

pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(secret): Extension<JwtSecret>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    // Hash password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = match argon2.hash_password(payload.password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to hash password"})),
            )
                .into_response()
        }
    };

    let now = chrono::Utc::now().naive_utc();
    let new_customer = customer::ActiveModel {
        name: Set(payload.name),
        email: Set(payload.email),
        age: Set(payload.age),
        gender: Set(payload.gender),
        password_hash: Set(password_hash),
        role: Set("USER".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_customer.insert(&db).await {
        Ok(customer) => {
            let token = match auth::issue_token(customer.id, &customer.email, &secret.0) {
                Ok(t) => t,
                Err(e) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": e.to_string()})),
                    )
                        .into_response()
                }
            };

            tracing::Span::current()
                .record("table", "customers")
                .record("action", "register_customer")
                .record("user_id", customer.id)
                .record("user_email", &customer.email);

            metrics::counter!("beacon_customers_registered_total").increment(1);
            metrics::gauge!("beacon_customers_total").increment(1.0);

            (
                StatusCode::CREATED,
                [(header::AUTHORIZATION, token)],
                Json(json!({"id": customer.id, "email": customer.email, "name": customer.name})),
            )
                .into_response()
        }
        Err(e) => {
            // Postgres unique violation on the email column
            let error_msg = e.to_string();
            if error_msg.contains("duplicate key value violates unique constraint") {
                tracing::Span::current()
                    .record("action", "register_customer_failed")
                    .record("error", "duplicate_email");

                return (
                    StatusCode::CONFLICT,
                    Json(json!({"error": "Email already exists"})),
                )
                    .into_response();
            }

            tracing::Span::current()
                .record("action", "register_customer_error")
                .record("error", display(&e));

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Extension(secret): Extension<JwtSecret>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let customer = match customer::Entity::find()
        .filter(customer::Column::Email.eq(payload.email.clone()))
        .one(&db)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid email or password"})),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let parsed_hash = match PasswordHash::new(&customer.password_hash) {
        Ok(h) => h,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Invalid password hash in DB"})),
            )
                .into_response()
        }
    };

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        let token = match auth::issue_token(customer.id, &customer.email, &secret.0) {
            Ok(t) => t,
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": e.to_string()})),
                )
                    .into_response()
            }
        };

        tracing::Span::current()
            .record("action", "login_customer")
            .record("user_id", customer.id)
            .record("user_email", &customer.email);

        (
            StatusCode::OK,
            [(header::AUTHORIZATION, token.clone())],
            Json(json!({"token": token, "id": customer.id, "email": customer.email})),
        )
            .into_response()
    } else {
        tracing::Span::current()
            .record("action", "login_customer_failed")
            .record("error", "invalid_credentials");

        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid email or password"})),
        )
            .into_response()
    }
}
