//! Stripe error types.

use thiserror::Error;

pub type StripeResult<T> = Result<T, StripeError>;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Stripe configuration error: {0}")]
    Config(String),

    #[error("Stripe API error ({status}): {message}")]
    Api {
        status: u16,
        error_type: Option<String>,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid Stripe response: {0}")]
    InvalidResponse(String),

    #[error("Webhook signature verification failed: {0}")]
    Signature(String),

    #[error("Invalid webhook payload: {0}")]
    Payload(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StripeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn signature(msg: impl Into<String>) -> Self {
        Self::Signature(msg.into())
    }

    /// HTTP status returned by Stripe, when the error came from the API.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
