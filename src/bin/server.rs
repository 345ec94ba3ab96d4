use axum::{
    routing::{get, post},
    Extension, Router,
};
use beacon_server::alerts::{AlertService, SeaOrmAlertStore};
use beacon_server::api::middleware::JwtSecret;
use beacon_server::live::LiveHub;
use beacon_server::tracking::LocationRegistry;
use beacon_server::{api, migrator};
use sea_orm::{Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    beacon_server::telemetry::init_telemetry("beacon-server");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Database Connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // JWT signing secret
    let jwt_secret = JwtSecret(Arc::new(
        std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
    ));

    // GCS Client (profile images)
    let gcs_config = google_cloud_storage::client::ClientConfig::default()
        .with_auth()
        .await
        .expect("Failed to configure GCS client");
    let gcs_client = google_cloud_storage::client::Client::new(gcs_config);

    // Run migrations
    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Initialize Metrics
    beacon_server::metrics::init_metrics(&db).await;

    // Live subsystem: one registry of last-known positions, one push hub,
    // both owned here and handed out by reference.
    let registry = Arc::new(LocationRegistry::new());
    let hub = Arc::new(LiveHub::new());
    let alert_service = Arc::new(AlertService::new(
        Arc::new(SeaOrmAlertStore::new(db.clone())),
        Arc::clone(&registry),
        hub.clone(),
    ));

    let app = app(
        db,
        gcs_client,
        jwt_secret,
        registry,
        hub,
        alert_service,
        prometheus_layer,
        metric_handle,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}

async fn health_check() -> &'static str {
    "OK"
}

#[allow(clippy::too_many_arguments)]
fn app(
    db: DatabaseConnection,
    gcs_client: google_cloud_storage::client::Client,
    jwt_secret: JwtSecret,
    registry: Arc<LocationRegistry>,
    hub: Arc<LiveHub>,
    alert_service: Arc<AlertService>,
    prometheus_layer: axum_prometheus::PrometheusMetricLayer<'static>,
    metric_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login));

    let protected_routes = Router::new()
        .route("/customers", get(api::customer::list_customers))
        .route(
            "/customers/:id",
            get(api::customer::get_customer)
                .patch(api::customer::update_customer)
                .delete(api::customer::delete_customer),
        )
        .route(
            "/customers/:id/profile-image",
            get(api::customer::get_profile_image).post(api::customer::upload_profile_image),
        )
        .route(
            "/alerts",
            get(api::alert::list_alerts).post(api::alert::create_alert),
        )
        .route("/alerts/nearby", get(api::alert::list_nearby_alerts))
        .route("/alerts/mine", get(api::alert::list_my_alerts))
        .route("/alerts/user/:id", get(api::alert::list_user_alerts))
        .route(
            "/alerts/:id",
            get(api::alert::get_alert)
                .put(api::alert::update_alert)
                .delete(api::alert::delete_alert),
        )
        .route(
            "/alerts/:id/status",
            axum::routing::patch(api::alert::update_alert_status),
        )
        .route_layer(axum::middleware::from_fn(api::middleware::auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected_routes)
        // The websocket feed authenticates via ?token= inside the handler,
        // so it sits outside the bearer-header middleware.
        .route("/ws", get(api::ws::ws_handler))
        .layer(Extension(db))
        .layer(Extension(gcs_client))
        .layer(Extension(jwt_secret))
        .layer(Extension(registry))
        .layer(Extension(hub))
        .layer(Extension(alert_service))
        .layer(prometheus_layer)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    let span_name = if let Some(path) = matched_path {
                        format!("{} {}", request.method(), path)
                    } else {
                        format!("{} {}", request.method(), request.uri().path())
                    };

                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        // Fields populated by handlers
                        table = tracing::field::Empty,
                        action = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        user_email = tracing::field::Empty,
                        error = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", tracing::field::display(response.status()));
                        span.record("latency", tracing::field::debug(latency));
                        tracing::info!("request completed");
                    },
                ),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(
                    std::env::var("ALLOWED_ORIGIN")
                        .unwrap_or_else(|_| "http://localhost:3000".to_string())
                        .parse::<axum::http::HeaderValue>()
                        .expect("Invalid ALLOWED_ORIGIN"),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true),
        )
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(axum::extract::DefaultBodyLimit::max(10 * 1024 * 1024))
}
