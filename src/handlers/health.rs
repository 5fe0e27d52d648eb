//! 健康检查处理器
//! 提供 /health 端点

use axum::Json;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

/// 服务名，调用方按此识别
pub const SERVICE_NAME: &str = "excel-produktbilder";

/// 应用启动时间
static APP_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 记录启动时间，在 main.rs 中尽早调用
pub fn set_start_time() {
    Lazy::force(&APP_START_TIME);
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START_TIME.elapsed().as_secs()
}

/// 存活探针
/// 快速响应，不检查外部图片服务器
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}
