//! Business logic services layer

pub mod enrichment;
pub mod image_fetcher;
pub mod image_processing;
pub mod workbook;

pub use enrichment::EnrichmentService;
pub use image_fetcher::{HttpImageFetcher, ImageSource};
