// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("storage failure: {0}")]
    StorageFailure(String),
    #[error("serialization failure: {0}")]
    SerializationFailure(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageFailure(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationFailure(err.to_string())
    }
}

pub mod config;
