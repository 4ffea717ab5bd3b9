//! `factcheck-cli` crate (library surface).
//!
//! The primary entrypoint for end users is the `factcheck` binary. This
//! library module exists to support embedding and to provide a stable way
//! to reuse core types without depending on internal crate layout.

pub use factcheck_core as core;

use std::path::PathBuf;

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("factcheck-cache")
}

pub fn default_partitions_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("factcheck-partitions")
}

pub fn cache_dir_from_env() -> PathBuf {
    std::env::var("FACTCHECK_CACHE_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_dir)
}

pub fn partitions_dir_from_env() -> PathBuf {
    std::env::var("FACTCHECK_PARTITIONS_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_partitions_dir)
}
