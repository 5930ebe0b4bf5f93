use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a webhook request was not processed. Each variant is terminal for
/// its request and maps to one plain-text HTTP response.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("405 Method not allowed")]
    MethodNotAllowed,

    #[error("404 Not found")]
    NotFound,

    #[error("400 Bad Request - Missing X-GitHub-Event Header")]
    MissingEvent,

    #[error("400 Bad Request - Unknown Event Type {0}")]
    UnknownEvent(String),

    #[error("403 Forbidden - Missing X-Hub-Signature required for HMAC verification")]
    MissingSignature,

    #[error("403 Forbidden - HMAC verification failed")]
    InvalidSignature,

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("failed to decode payload: {0}")]
    DecodeBody(String),

    #[error("could not read repository name from payload")]
    MissingRepositoryName,

    #[error("recovered from panic")]
    Panicked,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MissingEvent | Self::UnknownEvent(_) => StatusCode::BAD_REQUEST,
            Self::MissingSignature | Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::ReadBody(_)
            | Self::DecodeBody(_)
            | Self::MissingRepositoryName
            | Self::Panicked => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Webhook request failed");
        } else {
            tracing::warn!(status = status.as_u16(), reason = %self, "Webhook request rejected");
        }

        (status, self.to_string()).into_response()
    }
}
