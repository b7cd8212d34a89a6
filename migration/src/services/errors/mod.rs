use thiserror::Error;

use crate::features::migration::remap::RemapError;
use crate::services::client::ClientError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Missing dependency: {0}")]
    Remap(#[from] RemapError),

    #[error("Configuration error: {field} - {message}")]
    Configuration { field: String, message: String },

    #[error("Data file error: {path} - {message}")]
    DataFile { path: String, message: String },

    #[error("Migration step error: {step} - {reason}")]
    Step { step: String, reason: String },
}

pub type MigrationResult<T> = Result<T, MigrationError>;
