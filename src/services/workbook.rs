//! 工作簿操作
//!
//! 只处理活动工作表。图片列固定插在 A 列，原有列整体右移一列。

use std::io::Cursor;

use anyhow::Context;
use tempfile::TempDir;
use tracing::debug;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::Image;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{AppError, Result};
use crate::models::excel::{ArticleColumn, IMAGE_COLUMN_HEADER};

/// 图片列（A 列）
pub const IMAGE_COLUMN: u32 = 1;
const IMAGE_COLUMN_LETTER: &str = "A";

/// 图片列宽度
pub const IMAGE_COLUMN_WIDTH: f64 = 15.0;

/// 含图片的行高（磅）
pub const IMAGE_ROW_HEIGHT: f64 = 75.0;

/// 表头是否为货号列："artikel" 加上 "nr" 或 "nummer"
pub fn is_article_header(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    text.contains("artikel") && (text.contains("nr") || text.contains("nummer"))
}

/// 打开的工作簿
pub struct Workbook {
    book: Spreadsheet,
    /// 图片先落盘再交给 umya 读取
    media_dir: TempDir,
}

impl Workbook {
    /// 解析 XLSX 字节
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
            .map_err(|e| AppError::InvalidWorkbook(e.to_string()))?;
        let media_dir = tempfile::tempdir()
            .map_err(|e| AppError::Internal(format!("temp dir: {}", e)))?;

        Ok(Self { book, media_dir })
    }

    fn sheet(&self) -> &Worksheet {
        self.book.get_active_sheet()
    }

    fn sheet_mut(&mut self) -> &mut Worksheet {
        self.book.get_active_sheet_mut()
    }

    /// 第一行中所有非空表头，(列号, 文本)
    pub fn headers(&self) -> Vec<(u32, String)> {
        let sheet = self.sheet();
        (1..=sheet.get_highest_column())
            .map(|col| (col, sheet.get_value((col, 1))))
            .filter(|(_, value)| !value.trim().is_empty())
            .collect()
    }

    /// 查找货号列，取从左到右第一个匹配项
    pub fn find_article_column(&self) -> Result<ArticleColumn> {
        let headers = self.headers();

        if let Some((index, header)) = headers.iter().find(|(_, text)| is_article_header(text)) {
            return Ok(ArticleColumn {
                index: *index,
                header: header.clone(),
            });
        }

        Err(AppError::ArticleColumnNotFound {
            available: headers.into_iter().map(|(_, text)| text).collect(),
        })
    }

    /// 在最前面插入图片列并写表头
    pub fn insert_image_column(&mut self) {
        let sheet = self.sheet_mut();
        sheet.insert_new_column_by_index(&IMAGE_COLUMN, &1);
        sheet
            .get_cell_mut((IMAGE_COLUMN, 1))
            .set_value_string(IMAGE_COLUMN_HEADER);
    }

    pub fn highest_row(&self) -> u32 {
        self.sheet().get_highest_row()
    }

    /// 数据行的货号，(行号, 货号)，空单元格跳过
    pub fn article_numbers(&self, column: u32) -> Vec<(u32, String)> {
        let sheet = self.sheet();
        (2..=sheet.get_highest_row())
            .filter_map(|row| {
                let value = sheet.get_value((column, row));
                let value = value.trim();
                (!value.is_empty()).then(|| (row, value.to_string()))
            })
            .collect()
    }

    /// 把 JPEG 锚定到该行的图片列，并调整行高
    pub fn embed_image(&mut self, row: u32, jpeg: &[u8]) -> anyhow::Result<()> {
        // 文件名即 media 名，按行区分避免重名
        let path = self.media_dir.path().join(format!("artikelbild_{}.jpg", row));
        std::fs::write(&path, jpeg).context("failed to stage image")?;
        let path = path.to_str().context("non UTF-8 temp path")?;

        let mut marker = MarkerType::default();
        marker.set_coordinate(format!("{}{}", IMAGE_COLUMN_LETTER, row));
        let mut image = Image::default();
        image.new_image(path, marker);

        let sheet = self.sheet_mut();
        sheet.add_image(image);
        sheet.get_row_dimension_mut(&row).set_height(IMAGE_ROW_HEIGHT);

        debug!(row = row, bytes = jpeg.len(), "Image anchored");
        Ok(())
    }

    /// 设置图片列宽度
    pub fn finish(&mut self) {
        self.sheet_mut()
            .get_column_dimension_mut(IMAGE_COLUMN_LETTER)
            .set_width(IMAGE_COLUMN_WIDTH);
    }

    /// 序列化为 XLSX 字节
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&self.book, &mut cursor)
            .map_err(|e| AppError::Workbook(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
