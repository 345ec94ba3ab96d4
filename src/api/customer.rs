use axum::{
    body::Body,
    extract::{Extension, Multipart, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use google_cloud_storage::client::Client as GcsClient;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use serde_json::json;
use uuid::Uuid;

use crate::entities::customer;

fn customer_json(c: &customer::Model) -> serde_json::Value {
    json!({
        "id": c.id,
        "name": c.name,
        "email": c.email,
        "age": c.age,
        "gender": c.gender,
        "role": c.role,
        "profile_image_id": c.profile_image_id,
        "created_at": c.created_at,
    })
}

pub async fn list_customers(Extension(db): Extension<DatabaseConnection>) -> Response {
    match customer::Entity::find().all(&db).await {
        Ok(customers) => {
            let body: Vec<serde_json::Value> = customers.iter().map(customer_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

pub async fn get_customer(
    Extension(db): Extension<DatabaseConnection>,
    Path(customer_id): Path<i32>,
) -> Response {
    match customer::Entity::find_by_id(customer_id).one(&db).await {
        Ok(Some(c)) => (StatusCode::OK, Json(customer_json(&c))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Customer not found"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(serde::Deserialize)]
pub struct UpdateCustomerRequest {
    name: Option<String>,
    email: Option<String>,
    age: Option<i32>,
    gender: Option<String>,
}

pub async fn update_customer(
    Extension(db): Extension<DatabaseConnection>,
    Path(customer_id): Path<i32>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Response {
    let existing = match customer::Entity::find_by_id(customer_id).one(&db).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Customer not found"})),
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

    let mut active = existing.into_active_model();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(age) = payload.age {
        active.age = Set(age);
    }
    if let Some(gender) = payload.gender {
        active.gender = Set(gender);
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(&db).await {
        Ok(c) => (StatusCode::OK, Json(customer_json(&c))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

pub async fn delete_customer(
    Extension(db): Extension<DatabaseConnection>,
    Path(customer_id): Path<i32>,
) -> Response {
    match customer::Entity::delete_by_id(customer_id).exec(&db).await {
        Ok(res) if res.rows_affected == 0 => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Customer not found"})),
        )
            .into_response(),
        Ok(_) => {
            metrics::gauge!("beacon_customers_total").decrement(1.0);
            (StatusCode::OK, Json(json!({"message": "Customer deleted"}))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

// POST /customers/:id/profile-image
pub async fn upload_profile_image(
    Extension(db): Extension<DatabaseConnection>,
    Extension(gcs_client): Extension<GcsClient>,
    Path(customer_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bucket_name = std::env::var("GCS_BUCKET_NAME")
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "GCS_BUCKET_NAME not set".to_string()))?;

    let existing = customer::Entity::find_by_id(customer_id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Customer not found".to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "image" {
            let file_name = field.file_name().unwrap_or("image.jpg").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

            if data.len() > 5 * 1024 * 1024 {
                return Err((StatusCode::PAYLOAD_TOO_LARGE, "File too large".to_string()));
            }

            let ext = std::path::Path::new(&file_name)
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("jpg");
            let object_name = format!("profile-images/{}/{}.{}", customer_id, Uuid::new_v4(), ext);
            let mime_type = mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string();

            let upload_type = UploadType::Simple(Media {
                name: object_name.clone().into(),
                content_type: mime_type.into(),
                content_length: Some(data.len() as u64),
            });

            gcs_client
                .upload_object(
                    &UploadObjectRequest {
                        bucket: bucket_name.clone(),
                        ..Default::default()
                    },
                    data,
                    &upload_type,
                )
                .await
                .map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("GCS upload failed: {}", e),
                    )
                })?;

            let mut active = existing.into_active_model();
            active.profile_image_id = Set(Some(object_name.clone()));
            active.updated_at = Set(chrono::Utc::now().naive_utc());
            active
                .update(&db)
                .await
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

            return Ok(Json(json!({"profile_image_id": object_name})));
        }
    }

    Err((StatusCode::BAD_REQUEST, "No image field found".to_string()))
}

// GET /customers/:id/profile-image
pub async fn get_profile_image(
    Extension(db): Extension<DatabaseConnection>,
    Extension(gcs_client): Extension<GcsClient>,
    Path(customer_id): Path<i32>,
) -> Response {
    let bucket_name = match std::env::var("GCS_BUCKET_NAME") {
        Ok(b) => b,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "GCS_BUCKET_NAME not set"})),
            )
                .into_response()
        }
    };

    let customer = match customer::Entity::find_by_id(customer_id).one(&db).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Customer not found"})),
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

    let object_name = match customer.profile_image_id {
        Some(id) => id,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Customer has no profile image"})),
            )
                .into_response()
        }
    };

    let request = GetObjectRequest {
        bucket: bucket_name,
        object: object_name.clone(),
        ..Default::default()
    };

    match gcs_client
        .download_object(&request, &Range::default())
        .await
    {
        Ok(data) => {
            let content_type = mime_guess::from_path(&object_name)
                .first_or_octet_stream()
                .to_string();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                Body::from(data),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to fetch profile image from GCS: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch profile image"})),
            )
                .into_response()
        }
    }
}
