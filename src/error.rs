use thiserror::Error;

use crate::config::LoadError;
use crate::infra::InfraError;
use crate::links::LinkError;
use crate::registry::RegistryError;

/// Top-level error of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Request(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }
}
