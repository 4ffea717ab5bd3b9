//! Process-wide configuration, parsed once at startup (§2 AMBIENT, §6).
//!
//! Every named environment variable in spec.md §6 has a field here; nothing
//! downstream reads `std::env` mid-request.

#[derive(Debug, Clone)]
pub struct Config {
    pub max_claims_to_fact_check: usize,
    pub max_articles_per_claim: usize,
    pub distance_threshold: f32,
    pub max_concurrent_claims: usize,
    pub max_concurrent_judgments: usize,
    pub max_concurrent_body_fetches: usize,
    pub max_evidences_per_claim: usize,
    pub partition_stop_hits: usize,
    pub low_confidence_threshold: u8,
    pub s3_bucket_name: Option<String>,
    /// Identifier substring of the designated overflow partition (§9: a
    /// configuration key, not a hardcoded literal; reference default `"9"`).
    pub overflow_partition_id: String,
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u8>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_claims_to_fact_check: 10,
            max_articles_per_claim: 10,
            distance_threshold: 0.8,
            max_concurrent_claims: 3,
            max_concurrent_judgments: 7,
            max_concurrent_body_fetches: 7,
            max_evidences_per_claim: 10,
            partition_stop_hits: 1,
            low_confidence_threshold: 20,
            s3_bucket_name: None,
            overflow_partition_id: "9".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_claims_to_fact_check: env_usize(
                "MAX_CLAIMS_TO_FACT_CHECK",
                d.max_claims_to_fact_check,
            ),
            max_articles_per_claim: env_usize("MAX_ARTICLES_PER_CLAIM", d.max_articles_per_claim),
            distance_threshold: env_f32("DISTANCE_THRESHOLD", d.distance_threshold),
            max_concurrent_claims: env_usize("MAX_CONCURRENT_CLAIMS", d.max_concurrent_claims),
            max_concurrent_judgments: env_usize(
                "MAX_CONCURRENT_JUDGMENTS",
                d.max_concurrent_judgments,
            ),
            max_concurrent_body_fetches: env_usize(
                "MAX_CONCURRENT_BODY_FETCHES",
                d.max_concurrent_body_fetches,
            ),
            max_evidences_per_claim: env_usize(
                "MAX_EVIDENCES_PER_CLAIM",
                d.max_evidences_per_claim,
            ),
            partition_stop_hits: env_usize("PARTITION_STOP_HITS", d.partition_stop_hits),
            low_confidence_threshold: env_u8(
                "LOW_CONFIDENCE_THRESHOLD",
                d.low_confidence_threshold,
            ),
            s3_bucket_name: env_string("S3_BUCKET_NAME"),
            overflow_partition_id: env_string("FACTCHECK_OVERFLOW_PARTITION_ID")
                .unwrap_or(d.overflow_partition_id),
        }
    }
}
