pub mod api;
pub mod baseline;
pub mod config;
pub mod context;
pub mod dialect;
pub mod edit;
pub mod error;
pub mod formatter;
pub mod lexer;
pub mod line;
pub mod mode;
pub mod notebook;
pub mod passes;
pub mod region;
pub mod report;
pub mod token;

// Re-export the main public API
pub use api::{
    format_document, format_file, format_selection, format_string, get_matching_paths, run,
    DocumentOutcome, SpanFailure,
};
pub use config::{load_config, FormatConfig, KeywordCase};
pub use error::SqlembedError;
pub use formatter::{normalize, StructuralNormalizer};
pub use mode::Mode;
pub use region::DocumentKind;
