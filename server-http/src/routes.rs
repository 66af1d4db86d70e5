use crate::handlers;
use crate::middleware::{auth_middleware, ApiToken};
use crate::state::AppState;
use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use shared::config::Config;
use tower::Layer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState, config: &Config) -> Router {
    let protected = Router::new()
        .route("/status", get(handlers::status))
        // Cache routes
        .route("/cache", delete(handlers::clear_cache))
        .route("/cache/fingerprint", post(handlers::fingerprint_body))
        .route("/cache/purge", post(handlers::purge_expired))
        .route(
            "/cache/{key}",
            get(handlers::get_value)
                .put(handlers::put_value)
                .delete(handlers::delete_value),
        )
        .route("/cache/{key}/meta", get(handlers::get_entry_meta))
        // Artifact routes
        .route(
            "/artifacts/{id}/{kind}",
            put(handlers::put_artifact).get(handlers::get_artifact),
        )
        .route(
            "/artifacts/{id}/{kind}/metadata",
            get(handlers::get_artifact_metadata),
        )
        .route(
            "/records/{hash}",
            put(handlers::put_record).get(handlers::get_record),
        )
        // Admin routes
        .route("/admin/cleanup", post(handlers::cleanup_artifacts))
        // TEMPO routes
        .route("/tempo/data", post(handlers::fetch_tempo_data))
        .route("/tempo/collections", get(handlers::list_collections))
        .route_layer(middleware::from_fn_with_state(
            ApiToken::new(&config.api_token),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(protected)
        // Middleware
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The router wrapped so `/status/` routes like `/status`.
///
/// Normalisation has to run before routing, so it wraps the whole router
/// instead of being added with `Router::layer`.
pub fn build_service(state: AppState, config: &Config) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state, config))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
