//! Pre-built wrappers for known services.

mod summarizer;

pub use summarizer::SummarizationService;
