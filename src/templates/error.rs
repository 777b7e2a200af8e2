//! Template engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template override directory missing
    #[error("Template directory not found: {0}")]
    DirectoryNotFound(String),

    /// Template failed to parse or render
    #[error("Template error: {0}")]
    Render(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
