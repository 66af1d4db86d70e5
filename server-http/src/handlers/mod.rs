pub mod admin_ops;
pub mod artifacts;
pub mod cache_ops;
pub mod health;
pub mod records;
pub mod status;
pub mod tempo;

pub use admin_ops::cleanup_artifacts;
pub use artifacts::{get_artifact, get_artifact_metadata, put_artifact};
pub use cache_ops::{
    clear_cache, delete_value, fingerprint_body, get_entry_meta, get_value, purge_expired,
    put_value,
};
pub use health::{health_check, root};
pub use records::{get_record, put_record};
pub use status::status;
pub use tempo::{fetch_tempo_data, list_collections};

use crate::models::{api_error, ApiError};
use axum::http::StatusCode;

/// Run synchronous store work off the async executor.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking store task failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Store task failed")
    })
}

/// Map a store error onto a response. The store has already logged it.
pub(crate) fn store_error(err: shared::Error) -> ApiError {
    match err {
        shared::Error::InvalidKey(reason) => api_error(StatusCode::BAD_REQUEST, reason),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
