//! 统一错误模型
//! 定义所有错误类型和错误响应格式
//!
//! 对外的错误信息沿用德语，调用方（Make.com 场景）按这些文本做分支判断。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("excel_data missing from request")]
    MissingExcelData,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Invalid workbook: {0}")]
    InvalidWorkbook(String),

    #[error("Article number column not found")]
    ArticleColumnNotFound { available: Vec<String> },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 统一的 Result 别名
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingExcelData
            | AppError::InvalidBase64(_)
            | AppError::InvalidWorkbook(_)
            | AppError::ArticleColumnNotFound { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Workbook(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取返回给调用方的错误消息
    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingExcelData => {
                "Kein Excel-Datei übertragen (excel_data fehlt)".to_string()
            }
            AppError::InvalidBase64(detail) => format!("Ungültiges Base64-Format: {}", detail),
            AppError::InvalidWorkbook(detail) => format!("Ungültige Excel-Datei: {}", detail),
            AppError::ArticleColumnNotFound { available } => format!(
                "Spalte 'Artikel Nr.' nicht gefunden. Verfügbare Spalten: {}",
                available.join(", ")
            ),
            AppError::PayloadTooLarge => "Anfrage zu groß".to_string(),
            AppError::Workbook(detail) | AppError::Internal(detail) => {
                format!("Server-Fehler: {}", detail)
            }
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

/// 错误响应 DTO
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 记录错误日志，客户端错误只记 warn；request_id 由请求 span 携带
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                "Application error"
            );
        } else {
            tracing::warn!(
                code = self.code(),
                message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            success: false,
            error: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}
