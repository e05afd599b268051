//! Error types for context management

use chatrelay_runtime::ProviderError;
use thiserror::Error;

/// Context management error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("completion failed: {0}")]
    Completion(#[from] ProviderError),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
