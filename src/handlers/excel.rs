//! Excel 处理器
//!
//! POST /process-excel：接收 base64 编码的工作簿，返回插入产品图后的工作簿。
//! 默认以二进制附件返回，`?format=json` 时返回旧版 JSON 结构。

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{AppError, Result},
    middleware::AppState,
    models::excel::{
        EnrichedWorkbook, EnrichmentStats, OutputFormat, ProcessExcelQuery, ProcessExcelRequest,
        ProcessExcelResponse,
    },
};

/// XLSX 的 MIME 类型
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const TOTAL_ROWS_HEADER: &str = "x-total-rows";
pub const SUCCESSFUL_IMAGES_HEADER: &str = "x-successful-images";
pub const FAILED_IMAGES_HEADER: &str = "x-failed-images";

/// Content-Disposition 中不安全的字符
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._\- ]").expect("valid regex"));

/// 生成可放入响应头的 ASCII 文件名
pub fn header_safe_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(filename, "_").into_owned()
}

/// 处理 Excel 工作簿
pub async fn process_excel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessExcelQuery>,
    payload: std::result::Result<Json<ProcessExcelRequest>, JsonRejection>,
) -> Result<Response> {
    // 请求体无法解析与缺少 excel_data 同样处理，超限除外
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Request body rejected");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::MissingExcelData
        }
    })?;
    let excel_data = request
        .excel_data
        .as_deref()
        .ok_or(AppError::MissingExcelData)?;
    let format = query.format;

    info!(
        filename = %request.filename(),
        payload_len = excel_data.len(),
        format = ?format,
        "Processing workbook"
    );

    let enriched = state
        .enrichment_service
        .enrich(excel_data, request.filename())
        .await?;

    match format {
        OutputFormat::Binary => Ok(binary_response(enriched)),
        OutputFormat::Json => Ok(json_response(enriched)),
    }
}

fn stats_headers(stats: &EnrichmentStats) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (TOTAL_ROWS_HEADER, stats.total_rows),
        (SUCCESSFUL_IMAGES_HEADER, stats.successful_images),
        (FAILED_IMAGES_HEADER, stats.failed_images),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
    headers
}

fn binary_response(enriched: EnrichedWorkbook) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_filename(&enriched.filename)
    );

    (
        stats_headers(&enriched.stats),
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        enriched.data,
    )
        .into_response()
}

fn json_response(enriched: EnrichedWorkbook) -> Response {
    let headers = stats_headers(&enriched.stats);
    let body = ProcessExcelResponse {
        success: true,
        output_file: STANDARD.encode(&enriched.data),
        output_filename: enriched.filename,
        stats: enriched.stats,
    };

    (headers, Json(body)).into_response()
}
