//! Request-level error taxonomy (§7). Only these two variants may abort a
//! request; everything else is recovered locally and reflected in per-claim
//! results or confidence.

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
