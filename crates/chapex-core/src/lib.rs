pub mod annotate;
pub mod caption;
pub mod chapters;
pub mod config;
pub mod error;
pub mod extraction;
pub mod figures;
pub mod geometry;
pub mod page;
pub mod pipeline;
pub mod record;
pub mod study;

pub use chapters::{ChapterPlan, ChapterRange};
pub use config::ExtractOptions;
pub use error::ChapexError;
pub use pipeline::{extract_document, CancelToken, ExtractionReport};
pub use record::{load_chapter, ChapterRecord};
