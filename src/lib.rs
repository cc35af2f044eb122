pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::SeparatorConfig;
use crate::services::separation::SeparationService;
use crate::services::separator::SeparationTool;
use crate::services::track_store::FsTrackStore;
use crate::services::upload::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::index::show_form,
        api::handlers::index::upload_and_separate,
        api::handlers::download::download_stem,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            models::SeparationResult,
            models::TrackId,
        )
    ),
    tags(
        (name = "separation", description = "Upload, separate and download stems"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: SeparatorConfig,
    pub uploads: Arc<UploadService>,
    pub separation: Arc<SeparationService>,
}

impl AppState {
    /// Wires both components from one configuration and the given separation tool.
    pub fn new(config: SeparatorConfig, tool: Arc<dyn SeparationTool>) -> Self {
        let tracks = Arc::new(FsTrackStore::new(&config));
        Self {
            uploads: Arc::new(UploadService::new(&config)),
            separation: Arc::new(SeparationService::new(&config, tool, tracks)),
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    // Room for the multipart framing around the file itself
    let body_limit = state.config.max_file_size + 64 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/",
            get(api::handlers::index::show_form)
                .post(api::handlers::index::upload_and_separate)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/separated/:track_id/:stem_filename",
            get(api::handlers::download::download_stem),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&api::middleware::request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outermost, so the span above sees a generated id
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
