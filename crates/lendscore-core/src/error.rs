//! Error types for Lendscore Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LendscoreError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid registry: {0}")]
    Registry(String),

    #[error("Invalid selector '{selector}' for {version}")]
    InvalidSelector { version: String, selector: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LendscoreResult<T> = Result<T, LendscoreError>;
