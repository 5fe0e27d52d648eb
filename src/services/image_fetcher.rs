//! 产品图下载
//!
//! 按配置的文件名模板依次尝试，第一个返回 200 且能解码的图片即为结果。

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ImageConfig, SKU_PLACEHOLDER};

/// 下载到的产品图
#[derive(Debug, Clone)]
pub struct FoundImage {
    pub image: DynamicImage,
    /// 命中的 URL
    pub url: String,
}

/// 产品图来源
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// 按货号查找产品图，找不到返回 None
    async fn fetch(&self, sku: &str) -> Option<FoundImage>;
}

/// 基于 HTTP 的产品图下载器
pub struct HttpImageFetcher {
    client: Client,
    base_url: String,
    url_patterns: Vec<String>,
}

impl HttpImageFetcher {
    /// 创建下载器
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(concat!("excel-produktbilder/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            url_patterns: config.url_patterns.clone(),
        })
    }

    /// 按尝试顺序生成候选 URL
    pub fn candidate_urls(&self, sku: &str) -> Vec<String> {
        self.url_patterns
            .iter()
            .map(|pattern| format!("{}{}", self.base_url, pattern.replace(SKU_PLACEHOLDER, sku)))
            .collect()
    }

    /// 尝试单个 URL，非 200 返回 Ok(None)
    async fn try_url(&self, url: &str) -> Result<Option<DynamicImage>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;

        if response.status() != StatusCode::OK {
            debug!(url = %url, status = %response.status(), "Image variant not available");
            return Ok(None);
        }

        let bytes = response.bytes().await.context("failed to read body")?;
        let image = image::load_from_memory(&bytes).context("body is not a decodable image")?;
        Ok(Some(image))
    }
}

#[async_trait]
impl ImageSource for HttpImageFetcher {
    async fn fetch(&self, sku: &str) -> Option<FoundImage> {
        for url in self.candidate_urls(sku) {
            debug!(url = %url, "Trying image variant");

            match self.try_url(&url).await {
                Ok(Some(image)) => {
                    info!(url = %url, sku = %sku, "Product image found");
                    return Some(FoundImage { image, url });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(url = %url, error = %format!("{:#}", e), "Image variant failed");
                }
            }
        }

        warn!(sku = %sku, "No product image found");
        None
    }
}
