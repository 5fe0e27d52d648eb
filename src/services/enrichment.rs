//! 工作簿富化服务
//!
//! 一次请求的完整流程：base64 解码、解析工作簿、定位货号列、插入图片列、
//! 下载并压缩产品图、写回工作簿。
//!
//! 解析和写回是 CPU 密集操作，放在 blocking 线程上执行；下载留在请求任务上，
//! 请求超时被丢弃时尚未完成的下载随之取消。并发数受 `images.concurrency` 限制。

use std::sync::Arc;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument};

use crate::{
    config::ImageConfig,
    error::{AppError, Result},
    models::excel::{EnrichedWorkbook, EnrichmentStats, OUTPUT_PREFIX},
    services::{
        image_fetcher::{FoundImage, ImageSource},
        image_processing,
        workbook::Workbook,
    },
};

/// 标准字母表，填充可有可无
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 解码请求中的 base64，忽略空白和换行
pub fn decode_excel_data(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| AppError::InvalidBase64(e.to_string()))
}

/// 输出文件名
pub fn output_filename(filename: &str) -> String {
    format!("{}{}", OUTPUT_PREFIX, filename)
}

/// 工作簿富化服务
pub struct EnrichmentService {
    source: Arc<dyn ImageSource>,
    config: ImageConfig,
}

impl EnrichmentService {
    pub fn new(source: Arc<dyn ImageSource>, config: ImageConfig) -> Self {
        Self { source, config }
    }

    /// 处理一个 base64 编码的工作簿
    #[instrument(skip(self, excel_data))]
    pub async fn enrich(&self, excel_data: &str, filename: &str) -> Result<EnrichedWorkbook> {
        let bytes = decode_excel_data(excel_data)?;

        let (workbook, rows, stats) = run_blocking(move || prepare_workbook(&bytes)).await?;

        let found = fetch_all(self.source.as_ref(), &rows, self.config.concurrency).await;

        let config = self.config.clone();
        let (data, stats) =
            run_blocking(move || embed_images(workbook, &rows, found, stats, &config)).await?;

        metrics::counter!("workbooks_processed_total").increment(1);
        info!(
            total_rows = stats.total_rows,
            successful_images = stats.successful_images,
            failed_images = stats.failed_images,
            "Workbook enriched"
        );

        Ok(EnrichedWorkbook {
            data,
            filename: output_filename(filename),
            stats,
        })
    }
}

/// 在 blocking 线程上执行，并沿用当前 span
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| AppError::Internal(format!("enrichment task failed: {}", e)))?
}

/// 解析工作簿并插入图片列，返回待下载的 (行号, 货号)
fn prepare_workbook(bytes: &[u8]) -> Result<(Workbook, Vec<(u32, String)>, EnrichmentStats)> {
    let mut workbook = Workbook::load(bytes)?;

    let article = workbook.find_article_column()?;
    info!(header = %article.header, column = article.index, "Article column found");

    workbook.insert_image_column();
    // 插入图片列后货号列右移一位
    let article_column = article.index + 1;

    let stats = EnrichmentStats::new(workbook.highest_row().saturating_sub(1));
    let rows = workbook.article_numbers(article_column);

    Ok((workbook, rows, stats))
}

/// 压缩并嵌入已下载的图片，返回新工作簿字节和统计
fn embed_images(
    mut workbook: Workbook,
    rows: &[(u32, String)],
    found: Vec<Option<FoundImage>>,
    mut stats: EnrichmentStats,
    config: &ImageConfig,
) -> Result<(Vec<u8>, EnrichmentStats)> {
    for ((row, sku), image) in rows.iter().zip(found) {
        let Some(image) = image else {
            metrics::counter!("images_missing_total").increment(1);
            stats.record_failure(format!("Zeile {}: Kein Bild gefunden für {}", row, sku));
            continue;
        };

        let embedded = image_processing::prepare_for_embedding(image.image, config)
            .map_err(anyhow::Error::from)
            .and_then(|jpeg| workbook.embed_image(*row, &jpeg));

        match embedded {
            Ok(()) => {
                metrics::counter!("images_embedded_total").increment(1);
                stats.record_success();
                info!(row = row, sku = %sku, url = %image.url, "Image embedded");
            }
            Err(e) => {
                metrics::counter!("images_missing_total").increment(1);
                error!(row = row, sku = %sku, error = %format!("{:#}", e), "Failed to embed image");
                stats.record_failure(format!("Zeile {}: Fehler beim Einfügen - {:#}", row, e));
            }
        }
    }

    workbook.finish();
    let data = workbook.save()?;
    Ok((data, stats))
}

/// 并发下载所有行的产品图，结果保持行顺序
async fn fetch_all(
    source: &dyn ImageSource,
    rows: &[(u32, String)],
    concurrency: usize,
) -> Vec<Option<FoundImage>> {
    let futures: Vec<_> = rows.iter().map(|(_, sku)| source.fetch(sku)).collect();
    stream::iter(futures)
        .buffered(concurrency)
        .collect()
        .await
}
