//! Document ingestion pipeline with multi-format parsing

mod chunker;
pub mod external_parser;
mod normalize;
mod parser;
mod processor;

pub use chunker::TextChunker;
pub use external_parser::{LibreOfficeConverter, PdftoppmRenderer, TesseractOcr};
pub use normalize::normalize;
pub use parser::{FileParser, ParserSettings};
pub use processor::{IngestPipeline, IngestProgress};
