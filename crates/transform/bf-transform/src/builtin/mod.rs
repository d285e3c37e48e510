//! Built-in native transforms.

mod data_enricher;
mod field_extractor;
mod passthrough;
mod score_filter;
mod text_length;

pub use data_enricher::DataEnricher;
pub use field_extractor::FieldExtractor;
pub use passthrough::Passthrough;
pub use score_filter::ScoreFilter;
pub use text_length::TextLengthFilter;
