//! 图片压缩
//!
//! 产品图先缩小到最大尺寸并以 JPEG 重新编码，再按单元格显示尺寸生成嵌入用字节。

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat, ImageResult};

use crate::config::ImageConfig;

/// 等比缩小到 max_width x max_height 以内，不放大
pub fn shrink_to_fit(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

/// 等比缩放到恰好撑满 width x height 的框，小图会被放大
pub fn fit_to_box(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() <= height
        || image.height() == height && image.width() <= width
    {
        return image;
    }
    image.resize(width, height, FilterType::Lanczos3)
}

/// 以给定质量编码为 JPEG，透明通道直接丢弃
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(&rgb)?;
    }
    Ok(buf)
}

/// 缩小并以 JPEG 重新压缩
pub fn compress(
    image: DynamicImage,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> ImageResult<DynamicImage> {
    let shrunk = shrink_to_fit(image, max_width, max_height);
    let jpeg = encode_jpeg(&shrunk, quality)?;
    image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
}

/// 生成嵌入工作簿的 JPEG 字节，图片按单元格显示框等比缩放
pub fn prepare_for_embedding(image: DynamicImage, config: &ImageConfig) -> ImageResult<Vec<u8>> {
    let compressed = compress(image, config.max_width, config.max_height, config.quality)?;
    let fitted = fit_to_box(compressed, config.display_width, config.display_height);
    encode_jpeg(&fitted, config.quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn test_config() -> ImageConfig {
        ImageConfig {
            base_url: "http://localhost/".to_string(),
            url_patterns: vec!["{sku}.jpg".to_string()],
            fetch_timeout_secs: 1,
            concurrency: 1,
            max_width: 150,
            max_height: 150,
            quality: 75,
            display_width: 100,
            display_height: 100,
        }
    }

    #[test]
    fn test_shrink_keeps_aspect_ratio() {
        let image = DynamicImage::new_rgb8(600, 300);
        let shrunk = shrink_to_fit(image, 150, 150);
        assert_eq!((shrunk.width(), shrunk.height()), (150, 75));
    }

    #[test]
    fn test_shrink_never_enlarges() {
        let image = DynamicImage::new_rgb8(40, 20);
        let shrunk = shrink_to_fit(image, 150, 150);
        assert_eq!((shrunk.width(), shrunk.height()), (40, 20));
    }

    #[test]
    fn test_compress_drops_alpha() {
        let rgba = RgbaImage::from_pixel(300, 300, Rgba([255, 0, 0, 128]));
        let compressed = compress(DynamicImage::ImageRgba8(rgba), 150, 150, 75).unwrap();
        assert_eq!((compressed.width(), compressed.height()), (150, 150));
        assert!(!compressed.color().has_alpha());
    }

    #[test]
    fn test_prepare_for_embedding_fits_display_box() {
        let image = DynamicImage::new_rgb8(800, 400);
        let bytes = prepare_for_embedding(image, &test_config()).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_prepare_for_embedding_enlarges_small_images() {
        let image = DynamicImage::new_rgb8(50, 25);
        let bytes = prepare_for_embedding(image, &test_config()).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn test_fit_to_box_keeps_exact_fit() {
        let image = DynamicImage::new_rgb8(100, 40);
        let fitted = fit_to_box(image, 100, 100);
        assert_eq!((fitted.width(), fitted.height()), (100, 40));
    }
}
