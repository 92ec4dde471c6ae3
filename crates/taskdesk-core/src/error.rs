use std::fmt;

use thiserror::Error;

/// A failed response: the accessor's own message, the status the API
/// answered with, and the API's `detail` text when it sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub status: u16,
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>, status: u16, detail: Option<String>) -> Self {
        Self {
            message: message.into(),
            status,
            detail,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) if detail != &self.message => write!(f, "{}: {detail}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication required; log in again")]
    Authentication,

    #[error("{0}")]
    Validation(String),

    #[error("server error (HTTP {status}): {0}", status = .0.status)]
    Server(Failure),

    #[error("{0}")]
    NotFound(Failure),

    #[error("{0}")]
    Fetch(Failure),

    #[error("{0}")]
    Save(Failure),

    #[error("{0}")]
    Delete(Failure),

    #[error("{0}")]
    StatusUpdate(Failure),

    #[error("{0}")]
    Registration(Failure),

    #[error("{0}")]
    Login(Failure),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Server(failure)
            | Self::NotFound(failure)
            | Self::Fetch(failure)
            | Self::Save(failure)
            | Self::Delete(failure)
            | Self::StatusUpdate(failure)
            | Self::Registration(failure)
            | Self::Login(failure) => Some(failure.status),
            Self::Transport(_) | Self::Validation(_) | Self::Decode(_) | Self::Encode(_) => None,
        }
    }
}
