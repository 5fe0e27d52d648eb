//! Excel enrichment models

use serde::{Deserialize, Serialize};

/// Filename used when the caller does not send one
pub const DEFAULT_FILENAME: &str = "output.xlsx";

/// Prefix of the returned workbook's filename
pub const OUTPUT_PREFIX: &str = "bearbeitet_";

/// Header written into the inserted image column
pub const IMAGE_COLUMN_HEADER: &str = "Artikelbild";

/// Process excel request
#[derive(Debug, Deserialize)]
pub struct ProcessExcelRequest {
    /// Base64 encoded XLSX workbook
    pub excel_data: Option<String>,
    pub filename: Option<String>,
}

impl ProcessExcelRequest {
    pub fn filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_FILENAME)
    }
}

/// Response shape selected via `?format=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// XLSX as binary download
    #[default]
    Binary,
    /// XLSX base64 encoded inside a JSON document
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessExcelQuery {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Per-request processing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub total_rows: u32,
    pub successful_images: u32,
    pub failed_images: u32,
    pub errors: Vec<String>,
}

impl EnrichmentStats {
    pub fn new(total_rows: u32) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.successful_images += 1;
    }

    pub fn record_failure(&mut self, message: String) {
        self.failed_images += 1;
        self.errors.push(message);
    }
}

/// Located article number column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleColumn {
    /// 1-based column index
    pub index: u32,
    pub header: String,
}

/// Result of a successful enrichment
#[derive(Debug, Clone)]
pub struct EnrichedWorkbook {
    pub data: Vec<u8>,
    pub filename: String,
    pub stats: EnrichmentStats,
}

/// Legacy JSON response
#[derive(Debug, Serialize)]
pub struct ProcessExcelResponse {
    pub success: bool,
    /// Base64 encoded XLSX workbook
    pub output_file: String,
    pub output_filename: String,
    pub stats: EnrichmentStats,
}
