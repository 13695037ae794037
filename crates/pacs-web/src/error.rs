//! HTTP错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use pacs_core::PacsError;
use serde_json::json;
use tracing::error;

/// 将 `PacsError` 转换为JSON错误响应
#[derive(Debug)]
pub struct ApiError(pub PacsError);

impl From<PacsError> for ApiError {
    fn from(err: PacsError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PacsError::NotFound(_) => StatusCode::NOT_FOUND,
            PacsError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError(PacsError::NotFound("Study S1".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError(PacsError::Validation("bad limit".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(PacsError::Database("connection reset".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(PacsError::Backend("timeout".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
