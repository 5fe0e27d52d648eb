//! 测试公共模块
//! 提供测试配置、桩图片源和工作簿构造工具

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use excel_produktbilder::{
    config::{AppConfig, ImageConfig, LoggingConfig, ServerConfig},
    middleware::AppState,
    services::{
        image_fetcher::{FoundImage, ImageSource},
        EnrichmentService,
    },
};
use image::DynamicImage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use umya_spreadsheet::Spreadsheet;

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            workers: 1,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        images: create_test_image_config("http://127.0.0.1:1/uploads/"),
    }
}

/// 创建图片配置，base_url 指向测试服务器
pub fn create_test_image_config(base_url: &str) -> ImageConfig {
    ImageConfig {
        base_url: base_url.to_string(),
        url_patterns: vec![
            "{sku}_1.jpg".to_string(),
            "thumbnail_{sku}_1.jpg".to_string(),
            "thumbnail_{sku}_1-scaled.jpg".to_string(),
            "{sku}_3-scaled.jpg".to_string(),
        ],
        fetch_timeout_secs: 5,
        concurrency: 2,
        max_width: 150,
        max_height: 150,
        quality: 75,
        display_width: 100,
        display_height: 100,
    }
}

/// 按货号返回固定图片的图片源
#[derive(Default)]
pub struct StubImageSource {
    images: HashMap<String, DynamicImage>,
}

impl StubImageSource {
    pub fn with_image(mut self, sku: &str, width: u32, height: u32) -> Self {
        self.images
            .insert(sku.to_string(), DynamicImage::new_rgb8(width, height));
        self
    }
}

#[async_trait]
impl ImageSource for StubImageSource {
    async fn fetch(&self, sku: &str) -> Option<FoundImage> {
        self.images.get(sku).map(|image| FoundImage {
            image: image.clone(),
            url: format!("stub://{}", sku),
        })
    }
}

/// 每次下载都先等待 delay 且永远找不到图片的图片源，记录已开始的下载数
pub struct SlowImageSource {
    delay: Duration,
    started: Arc<AtomicUsize>,
}

impl SlowImageSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn started(&self) -> Arc<AtomicUsize> {
        self.started.clone()
    }
}

#[async_trait]
impl ImageSource for SlowImageSource {
    async fn fetch(&self, _sku: &str) -> Option<FoundImage> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        None
    }
}

/// 创建测试应用状态
pub fn create_test_app_state(config: AppConfig, source: Arc<dyn ImageSource>) -> Arc<AppState> {
    let enrichment_service = Arc::new(EnrichmentService::new(source, config.images.clone()));
    Arc::new(AppState {
        config,
        enrichment_service,
    })
}

/// 按行构造工作簿，空字符串表示空单元格
pub fn build_workbook(rows: &[&[&str]]) -> Vec<u8> {
    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book.get_sheet_mut(&0).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet
                        .get_cell_mut((c as u32 + 1, r as u32 + 1))
                        .set_value_string(*value);
                }
            }
        }
    }
    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor).unwrap();
    cursor.into_inner()
}

/// 解析输出的工作簿
pub fn read_workbook(xlsx: &[u8]) -> Spreadsheet {
    umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(xlsx), true).unwrap()
}

/// 读取活动工作表中单元格的值
pub fn cell_value(xlsx: &[u8], col: u32, row: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(xlsx), true).unwrap();
    book.get_active_sheet().get_value((col, row))
}

/// 统计 XLSX 包中嵌入的图片数量
pub fn media_count(xlsx: &[u8]) -> usize {
    let archive = zip::ZipArchive::new(Cursor::new(xlsx)).unwrap();
    archive
        .file_names()
        .filter(|name| name.starts_with("xl/media/"))
        .count()
}

/// 构造 POST /process-excel 请求
pub fn process_excel_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 工作簿的 base64 编码
pub fn encode(xlsx: &[u8]) -> String {
    STANDARD.encode(xlsx)
}
