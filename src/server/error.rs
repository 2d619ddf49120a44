use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::CatalogError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<CatalogError>() {
            Some(CatalogError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(CatalogError::Conflict(_)) => StatusCode::CONFLICT,
            Some(CatalogError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Some(CatalogError::ExternalUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            Some(CatalogError::External(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("请求处理失败: {:#}", self.0);
        }
        (status, format!("{}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
