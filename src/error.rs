//! 统一的 API 错误类型与转换。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io::ErrorKind;
use tracing::debug;

use crate::storage::StorageError;

/// 处理器失败分类，仅在边界处映射为 HTTP 状态码。
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    MethodNotAllowed(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 错误详情只写日志，响应体保持为空。
        debug!(status = status.as_u16(), reason = self.message(), "request failed");
        status.into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::OutsideRoot => ApiError::BadRequest("path escapes root".into()),
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_errors_map_to_taxonomy() {
        let outside: ApiError = StorageError::OutsideRoot.into();
        assert!(matches!(outside, ApiError::BadRequest(_)));

        let missing: ApiError = StorageError::Io(io::Error::from(ErrorKind::NotFound)).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let denied: ApiError =
            StorageError::Io(io::Error::from(ErrorKind::PermissionDenied)).into();
        assert!(matches!(denied, ApiError::Internal(_)));
    }

    #[test]
    fn error_responses_have_status_only() {
        let response = ApiError::BadRequest("copy failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = ApiError::NotFound("missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
