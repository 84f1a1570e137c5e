//! Error types for kasbot-core

use thiserror::Error;

/// Main error type for the kasbot-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Document store error
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM parsing service error (call failure, timeout, malformed output)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vision/OCR service error
    #[error("vision error: {0}")]
    Vision(String),

    /// Both parser tiers exhausted without producing a draft
    #[error("parse failed: {0}")]
    Parse(String),

    /// Record amount could not be interpreted as a decimal
    #[error("invalid amount: {0}")]
    Amount(String),
}

/// Result type alias for kasbot-core
pub type Result<T> = std::result::Result<T, Error>;
