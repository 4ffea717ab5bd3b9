//! Public facade crate for the claim-to-evidence fact-checking pipeline.
//!
//! This crate intentionally contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `factcheck-core`.

pub use factcheck_core::*;
