//! Error taxonomy shared by the tutoring core and the web service.

/// Every failure a tutoring operation can surface to its caller.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Unknown student, topic or conversation.
    #[error("{0}")]
    NotFound(String),
    /// The operation is not allowed in the conversation's current state.
    #[error("{0}")]
    InvalidState(String),
    /// The challenge service reports that its limits are exhausted.
    #[error("{0}")]
    QuotaExceeded(String),
    /// Transport or HTTP failure talking to the challenge API or the LLM provider.
    #[error("upstream call failed: {message}")]
    Upstream { message: String, retryable: bool },
    /// The LLM answered, but not in the expected shape.
    #[error("could not interpret model output: {0}")]
    Inference(String),
}

impl TutorError {
    /// A permanent upstream failure.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            retryable: false,
        }
    }

    /// An upstream failure that may succeed when tried again.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream {
                retryable: true,
                ..
            }
        )
    }
}
