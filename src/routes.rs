//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod attachments;
mod auth;
mod complaints;
mod departments;
mod remarks;
mod users;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::{warn, Level};

// Room for the multipart framing around the largest accepted file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState) -> Router {
    let settings = &state.settings;

    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    let upload_limit = DefaultBodyLimit::max(state.attachments.max_bytes() + MULTIPART_OVERHEAD);

    // Routes behind a bearer token
    let protected = Router::new()
        // Auth
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/password", post(auth::change_password))

        // Users
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/api/users/{id}/profile", put(users::update_profile))

        // Departments
        .route(
            "/api/departments",
            get(departments::list_departments).post(departments::create_department),
        )

        // Complaints
        .route(
            "/api/complaints",
            get(complaints::list_complaints).post(complaints::create_complaint),
        )
        .route("/api/complaints/mine", get(complaints::my_complaints))
        .route(
            "/api/complaints/{id}",
            get(complaints::get_complaint)
                .put(complaints::update_complaint)
                .delete(complaints::delete_complaint),
        )
        .route("/api/complaints/{id}/history", get(complaints::complaint_history))
        .route(
            "/api/complaints/{id}/remarks",
            get(complaints::list_remarks).post(complaints::add_remark),
        )

        // Remarks
        .route("/api/remarks/{id}", put(remarks::update_remark))

        // Attachments
        .route(
            "/api/attachments",
            post(attachments::upload_attachment).layer(upload_limit),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .merge(protected);

    // Stored blobs
    let prefix = settings.media.url_prefix.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(prefix, ServeDir::new(&settings.media.root));
    } else {
        warn!("Media prefix {:?} is not servable; blobs will not be exposed", settings.media.url_prefix);
    }

    // Apply middleware and state
    router.layer(middleware).with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT];

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
