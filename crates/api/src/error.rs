// API error type
//
// Decision: One mapping from StoreError to both HTTP status codes and gRPC status codes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use calendar_core::StoreError;

use crate::api::common::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidArgument(String),
}

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::AlreadyExists(_) | StoreError::AlreadyNotified(_) => {
                    StatusCode::CONFLICT
                }
                StoreError::EmptyId | StoreError::InvalidNotifyLead(_) => StatusCode::BAD_REQUEST,
                StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Database(_) | StoreError::UnknownStorageType(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message safe to return to clients. Infrastructure details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Store(StoreError::Connection(_)) => "storage unavailable".to_string(),
            ApiError::Store(StoreError::Database(_) | StoreError::UnknownStorageType(_)) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }

    fn log(&self) {
        match self {
            ApiError::Store(e) if !e.is_domain() => tracing::error!("Storage error: {}", e),
            other => tracing::debug!("Request rejected: {}", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        ErrorResponse::new(self.public_message())
            .into_response(self.status_code())
            .into_response()
    }
}

impl From<ApiError> for tonic::Status {
    fn from(err: ApiError) -> Self {
        err.log();
        let message = err.public_message();
        match err {
            ApiError::InvalidArgument(_) => tonic::Status::invalid_argument(message),
            ApiError::Store(e) => match e {
                StoreError::NotFound(_) => tonic::Status::not_found(message),
                StoreError::AlreadyExists(_) => tonic::Status::already_exists(message),
                StoreError::EmptyId | StoreError::InvalidNotifyLead(_) => {
                    tonic::Status::invalid_argument(message)
                }
                StoreError::AlreadyNotified(_) => tonic::Status::failed_precondition(message),
                StoreError::Connection(_) => tonic::Status::unavailable(message),
                StoreError::Database(_) | StoreError::UnknownStorageType(_) => {
                    tonic::Status::internal(message)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_http_status_mapping() {
        let cases = [
            (StoreError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (StoreError::AlreadyExists("a".into()), StatusCode::CONFLICT),
            (StoreError::EmptyId, StatusCode::BAD_REQUEST),
            (StoreError::InvalidNotifyLead(-1), StatusCode::BAD_REQUEST),
            (StoreError::Connection("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_grpc_status_mapping() {
        let cases = [
            (StoreError::NotFound("a".into()), Code::NotFound),
            (StoreError::AlreadyExists("a".into()), Code::AlreadyExists),
            (StoreError::EmptyId, Code::InvalidArgument),
            (StoreError::InvalidNotifyLead(-1), Code::InvalidArgument),
            (StoreError::AlreadyNotified("a".into()), Code::FailedPrecondition),
            (StoreError::Connection("down".into()), Code::Unavailable),
            (StoreError::Database("boom".into()), Code::Internal),
        ];
        for (err, expected) in cases {
            assert_eq!(tonic::Status::from(ApiError::from(err)).code(), expected);
        }
    }

    #[test]
    fn test_infrastructure_details_are_hidden() {
        let status = tonic::Status::from(ApiError::from(StoreError::Database(
            "relation events does not exist".into(),
        )));
        assert_eq!(status.message(), "internal error");
    }
}
