//! Error taxonomy for generation requests.
//!
//! Every failure is scoped to the single operation that raised it; nothing
//! here is fatal to the process.

/// Failure modes of a gateway invocation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Rejected before any network call (missing API key/model, empty input).
    #[error("{message}")]
    Validation { message: String },

    /// The network call itself could not complete.
    #[error("network error: {message}")]
    Transport { message: String },

    /// The endpoint answered with a non-success status. Carries the
    /// server-supplied error message when one was present in the body.
    #[error("{message}")]
    Protocol { message: String },

    /// A success response whose body lacks the expected generated-text path.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// True for failures detected before any request was issued.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
