//! Excel 产品图服务库
//! 接收 Excel 工作簿，下载产品图并嵌入后返回

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
