//! Error types for promptlog-llm.

/// Errors that can occur while executing a rendered prompt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid execution input (missing provider, empty API key, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// No model is known for the requested provider
    #[error("no default model for provider '{0}'")]
    UnsupportedClient(String),

    /// The provider client reported a failure
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider call exceeded its deadline
    #[error("provider call exceeded its {0}ms deadline")]
    Timeout(u64),

    /// The observability store rejected a write
    #[error(transparent)]
    Store(#[from] promptlog_core::Error),
}

impl Error {
    /// Stable kind label, used as the prefix of stored error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::UnsupportedClient(_) => "UnsupportedClientError",
            Self::Provider(_) => "ProviderError",
            Self::Timeout(_) => "TimeoutError",
            Self::Store(_) => "StoreError",
        }
    }

    /// Human-readable detail without the kind prefix.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Provider(msg) => msg.clone(),
            Self::UnsupportedClient(provider) => {
                format!("no default model for provider '{provider}'")
            }
            Self::Timeout(ms) => format!("deadline of {ms}ms exceeded"),
            Self::Store(err) => err.to_string(),
        }
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
