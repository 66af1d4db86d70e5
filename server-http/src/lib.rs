pub mod handlers;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod provider;
pub mod routes;
pub mod state;
pub mod validation;

// Re-export key types
pub use provider::{DataProvider, ProviderError, ProviderResult, TempoDataRequest};
pub use routes::{build_router, build_service};
pub use state::AppState;
