// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    Auth,
    NotFound,
    Validation,
    Unknown,
}

/// Failure reported by the tracker backend, classified so callers can show
/// a message that matches the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("cannot reach {url} -- check [api].base_url and that the server is running ({detail})")]
    Network { url: String, detail: String },
    #[error("authentication failed: {0} -- set [api].token or JOBTRACK_TOKEN and retry")]
    Auth(String),
    #[error("not found or access denied: {0}")]
    NotFound(String),
    #[error("server rejected the request: {0}")]
    Validation(String),
    #[error("request failed: {0}")]
    Unknown(String),
}

impl ApiError {
    pub fn missing_token() -> Self {
        Self::Auth("no API token configured".to_owned())
    }

    pub const fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network { .. } => ApiErrorKind::Network,
            Self::Auth(_) => ApiErrorKind::Auth,
            Self::NotFound(_) => ApiErrorKind::NotFound,
            Self::Validation(_) => ApiErrorKind::Validation,
            Self::Unknown(_) => ApiErrorKind::Unknown,
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth(message),
            403 | 404 => Self::NotFound(message),
            400 | 409 | 422 => Self::Validation(message),
            _ => Self::Unknown(message),
        }
    }
}
