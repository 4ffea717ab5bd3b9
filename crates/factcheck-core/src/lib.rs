//! Backend-agnostic domain types and collaborator traits for the
//! claim-to-evidence fact-checking pipeline.
//!
//! This crate intentionally contains no IO. It defines the shapes the
//! orchestration crate (`factcheck-pipeline`) consumes and the contracts
//! concrete adapters (`factcheck-local`) implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single verifiable factual assertion extracted from a source text.
///
/// Immutable once produced by a `ClaimExtractor` + `ClaimReducer` pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub text: String,
    /// Position of this claim within the reduced claim set (0-based).
    pub position: usize,
}

/// Upper bound on the number of claims carried through one request (§3).
pub const MAX_CLAIMS: usize = 10;

/// A prebuilt nearest-neighbor index over news titles.
///
/// Multiple partitions coexist; `TitleIndexRegistry` (in `factcheck-pipeline`)
/// exposes them newest-first by `ordinal`. Implementations must be cheap to
/// clone/share (`Arc`) since a snapshot is handed to every in-flight request.
pub trait PartitionHandle: Send + Sync {
    /// Stable identifier, e.g. `"partition_7"`.
    fn id(&self) -> &str;
    /// Numeric suffix of `id()`; larger is newer. Iteration order is
    /// descending ordinal.
    fn ordinal(&self) -> i64;
    /// Number of title vectors held by this partition.
    fn len(&self) -> usize;
    /// Batched k-nearest-neighbor search, L2 distance, ascending by distance
    /// per query. Returns one result vector per input query vector, each
    /// truncated to `k` (fewer if the partition holds fewer vectors).
    fn search(&self, query_vectors: &[Vec<f32>], k: usize) -> Vec<Vec<TitleMatch>>;
}

/// A single title-index match: distance plus the matched title's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleMatch {
    pub distance: f32,
    pub title: String,
    pub url: String,
}

/// One document tracked by an `ArticleIndex`: body text plus its embedding.
#[derive(Debug, Clone)]
pub struct ArticleDocument {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// The materialized body + embedding(s) for one URL. Produced lazily and
/// cached indefinitely by `ArticleIndexCache` (eviction is the operator's
/// responsibility, per §5).
#[derive(Debug, Clone)]
pub struct ArticleIndex {
    pub url: String,
    pub documents: Vec<ArticleDocument>,
}

impl ArticleIndex {
    /// Concatenated body text across all documents (§4.3 Stage D).
    pub fn concatenated_text(&self) -> String {
        self.documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Which search provider produced a `SearchHit` (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderTag {
    Primary,
    Secondary,
}

/// A single search-result title, in both raw and cleaned form, preserving
/// the provider's original ranking position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub raw_title: String,
    pub cleaned_title: String,
    pub url: String,
    pub provider: ProviderTag,
}

/// A body snippet matched to a claim through the two-stage retrieval
/// pipeline, not yet judged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceCandidate {
    pub url: String,
    pub body_snippet: String,
    pub matched_title: Option<String>,
}

/// Relevance verdict emitted by the Judge (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Yes,
    No,
}

/// Structured output of `Judge::evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub relevance: Relevance,
    pub fact_description: String,
    pub justification: String,
    pub snippet: String,
}

/// An accepted `EvidenceCandidate`: `relevance=yes` and not yet used for
/// this claim. Serializes to the bit-exact evidence shape in the public
/// `PipelineResult` JSON schema (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub relevance: Relevance,
    pub fact_check_result: String,
    pub justification: String,
    pub snippet: String,
    /// Preferred label for source-diversity counting (§4.5), e.g. the
    /// matched title's source outlet. Falls back to the URL host when
    /// absent. Not part of the public JSON schema.
    #[serde(skip_serializing, default)]
    pub source_title: Option<String>,
}

impl Evidence {
    /// The label used for source-diversity counting (§4.5): `source_title`
    /// if present, else the URL's host.
    pub fn diversity_key(&self) -> String {
        if let Some(t) = &self.source_title {
            if !t.trim().is_empty() {
                return t.trim().to_lowercase();
            }
        }
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_else(|| self.url.to_lowercase())
    }
}

/// Outcome label for a single claim (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    LikelyTrue,
    InsufficientEvidence,
    Error,
}

/// Per-claim result: outcome, confidence, and at most 3 evidence entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim: String,
    pub result: ClaimOutcome,
    #[serde(rename = "confidence_score")]
    pub confidence: u8,
    pub evidence: Vec<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which kind of source a `PipelineResult` was produced from. Determines
/// the bit-exact top-level field names in the public JSON schema (§6).
#[derive(Debug, Clone)]
pub enum SourceDescriptor {
    Video { video_id: String, video_url: String },
    Article { article_url: String },
}

/// Auxiliary metadata populated alongside the claim fan-out; never fails
/// the request (§4.6 step 6).
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryMetadata {
    pub keywords: Vec<String>,
    pub three_line_summary: String,
    pub channel_type: Option<String>,
    pub channel_type_reason: Option<String>,
}

/// One full request's output. Custom-serializes to the bit-exact schema in
/// spec §6, where the confidence-score and identity fields are named
/// differently for the video vs. article variant.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub source: SourceDescriptor,
    pub aggregate_confidence: u8,
    pub summary: String,
    pub claims: Vec<ClaimResult>,
    pub aux: AuxiliaryMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Serialize for PipelineResult {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serde_json::Map::new();
        match &self.source {
            SourceDescriptor::Video { video_id, video_url } => {
                map.insert("video_id".into(), serde_json::json!(video_id));
                map.insert("video_url".into(), serde_json::json!(video_url));
                map.insert(
                    "video_total_confidence_score".into(),
                    serde_json::json!(self.aggregate_confidence),
                );
            }
            SourceDescriptor::Article { article_url } => {
                map.insert("article_url".into(), serde_json::json!(article_url));
                map.insert(
                    "article_total_confidence_score".into(),
                    serde_json::json!(self.aggregate_confidence),
                );
            }
        }
        map.insert("summary".into(), serde_json::json!(self.summary));
        map.insert("claims".into(), serde_json::json!(self.claims));
        map.insert("keywords".into(), serde_json::json!(self.aux.keywords));
        map.insert(
            "three_line_summary".into(),
            serde_json::json!(self.aux.three_line_summary),
        );
        if let Some(ct) = &self.aux.channel_type {
            map.insert("channel_type".into(), serde_json::json!(ct));
        }
        if let Some(ctr) = &self.aux.channel_type_reason {
            map.insert("channel_type_reason".into(), serde_json::json!(ctr));
        }
        map.insert(
            "created_at".into(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        serde_json::Value::Object(map).serialize(serializer)
    }
}

#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_article_body(&self, url: &str) -> Result<String>;
    async fn fetch_transcript(&self, video_url: &str) -> Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, docs: Vec<String>) -> Result<Vec<Vec<f32>>>;
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, claim: &str, body: &str) -> Result<Verdict>;
}

#[async_trait]
pub trait ClaimExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ClaimReducer: Send + Sync {
    async fn reduce(&self, claims: Vec<String>) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ChannelClassifier: Send + Sync {
    /// Returns `(channel_type, channel_type_reason)`.
    async fn classify(&self, transcript: &str) -> Result<(String, String)>;
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract_keywords(&self, text: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_three_lines(&self, text: &str) -> Result<String>;
}

/// Query-formation summarizer (§4.3 Stage A). Kept distinct from
/// `Summarizer` (the three-line auxiliary output) since the two have
/// different prompts/output shapes even though both compress text.
#[async_trait]
pub trait QuerySummarizer: Send + Sync {
    async fn summarize_query(&self, claim: &str) -> Result<String>;
}

#[async_trait]
pub trait PartitionProvider: Send + Sync {
    /// Immutable snapshot of the currently loaded partitions, ordered by
    /// descending ordinal.
    fn partitions(&self) -> Vec<Arc<dyn PartitionHandle>>;
    /// Atomically replace one partition. Callers holding an earlier
    /// snapshot are unaffected (§4.2).
    async fn reload(&self, partition_id: &str) -> Result<()>;
}

/// Idempotent, prefix-addressed blob storage (article/title index cache
/// tiers, §4.1/§4.2).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List and fetch every object under `prefix`, keyed by the suffix
    /// after `prefix`.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub language: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub cost_units: u64,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_result_serializes_with_video_field_names() {
        let r = PipelineResult {
            source: SourceDescriptor::Video {
                video_id: "abc123".into(),
                video_url: "https://youtu.be/abc123".into(),
            },
            aggregate_confidence: 42,
            summary: "summary".into(),
            claims: vec![],
            aux: AuxiliaryMetadata::default(),
            created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["video_id"], "abc123");
        assert_eq!(v["video_total_confidence_score"], 42);
        assert!(v.get("article_url").is_none());
        assert!(v.get("article_total_confidence_score").is_none());
    }

    #[test]
    fn article_result_serializes_with_article_field_names() {
        let r = PipelineResult {
            source: SourceDescriptor::Article {
                article_url: "https://example.com/a".into(),
            },
            aggregate_confidence: 7,
            summary: "summary".into(),
            claims: vec![],
            aux: AuxiliaryMetadata::default(),
            created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["article_url"], "https://example.com/a");
        assert_eq!(v["article_total_confidence_score"], 7);
        assert!(v.get("video_id").is_none());
    }

    #[test]
    fn claim_result_omits_error_when_absent() {
        let cr = ClaimResult {
            claim: "x".into(),
            result: ClaimOutcome::InsufficientEvidence,
            confidence: 0,
            evidence: vec![],
            error: None,
        };
        let v = serde_json::to_value(&cr).unwrap();
        assert!(v.get("error").is_none());
        assert_eq!(v["result"], "insufficient_evidence");
    }
}
