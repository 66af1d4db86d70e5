pub mod file_artifacts;
pub mod sled_cache;

pub use file_artifacts::FileArtifactStore;
pub use sled_cache::SledCacheStore;
