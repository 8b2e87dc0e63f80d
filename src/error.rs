#![allow(dead_code)]

use thiserror::Error;

/// Top-level error type for the streaming engine and its bootstrap.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("HTTP server error: {0}")]
    Http(#[from] HttpError),

    #[error("system error: {message}")]
    System { message: String },
}

/// HTTP server / streaming-specific error types.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    #[error("server startup failed: {details}")]
    StartupFailed { details: String },

    #[error("client connection error: {details}")]
    ClientConnection { details: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
