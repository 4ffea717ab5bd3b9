//! Claim-to-evidence fact-checking pipeline orchestration.
//!
//! This crate has no teacher equivalent: it wires the collaborator traits
//! from `factcheck-core` (implemented concretely in `factcheck-local`) into
//! the four components spec'd end to end — `ArticleIndexCache`,
//! `EvidenceRetriever`, `ClaimProcessor`, `PipelineDriver`.

pub mod article_index_cache;
pub mod claim_processor;
pub mod config;
pub mod error;
pub mod evidence_retriever;
pub mod pipeline_driver;

pub use article_index_cache::ArticleIndexCache;
pub use claim_processor::ClaimProcessor;
pub use config::Config;
pub use error::{PipelineError, Result};
pub use evidence_retriever::EvidenceRetriever;
pub use pipeline_driver::PipelineDriver;

use factcheck_core::{
    ChannelClassifier, ClaimExtractor, ClaimReducer, Embedder, Judge, KeywordExtractor,
    ObjectStore, PartitionProvider, QuerySummarizer, SearchProvider, Summarizer, TextFetcher,
};
use factcheck_local::llm::{
    LlmChannelClassifier, LlmClaimExtractor, LlmClaimReducer, LlmEmbedder, LlmJudge,
    LlmKeywordExtractor, LlmQuerySummarizer, LlmSummarizer,
};
use factcheck_local::object_store::S3ObjectStore;
use factcheck_local::openai_compat::OpenAiCompatClient;
use factcheck_local::partitions::LocalPartitionProvider;
use factcheck_local::search::{BraveSearchProvider, SearxngSearchProvider, TavilySearchProvider};
use factcheck_local::text_fetcher::LocalTextFetcher;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything constructed once at process startup and shared across
/// requests: the HTTP client, the configured collaborator adapters, the
/// partition provider, and the assembled `PipelineDriver` (§2 AMBIENT).
pub struct AppContext {
    pub config: Arc<Config>,
    pub pipeline_driver: Arc<PipelineDriver>,
    pub partition_provider: Arc<dyn PartitionProvider>,
}

impl AppContext {
    /// Build the context entirely from environment configuration, matching
    /// the teacher's `from_env`-everywhere convention.
    pub async fn from_env(
        local_cache_root: PathBuf,
        partitions_root: PathBuf,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(Config::from_env());

        let http_client = reqwest::Client::builder()
            .user_agent("factcheck-pipeline/0.1")
            .build()?;

        let llm_client = Arc::new(OpenAiCompatClient::from_env(http_client.clone(), None)?);

        let judge: Arc<dyn Judge> = Arc::new(LlmJudge::new(llm_client.clone()));
        let claim_extractor: Arc<dyn ClaimExtractor> =
            Arc::new(LlmClaimExtractor::new(llm_client.clone()));
        let claim_reducer: Arc<dyn ClaimReducer> = Arc::new(LlmClaimReducer::new(llm_client.clone()));
        let channel_classifier: Arc<dyn ChannelClassifier> =
            Arc::new(LlmChannelClassifier::new(llm_client.clone()));
        let embedder: Arc<dyn Embedder> = Arc::new(LlmEmbedder::new(llm_client.clone()));
        let keyword_extractor: Arc<dyn KeywordExtractor> =
            Arc::new(LlmKeywordExtractor::new(llm_client.clone()));
        let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::new(llm_client.clone()));
        let query_summarizer: Arc<dyn QuerySummarizer> =
            Arc::new(LlmQuerySummarizer::new(llm_client.clone()));

        let text_fetcher: Arc<dyn TextFetcher> = Arc::new(LocalTextFetcher::new()?);

        let object_store: Option<Arc<dyn ObjectStore>> = match &config.s3_bucket_name {
            Some(bucket) => Some(Arc::new(S3ObjectStore::from_env(bucket.clone()).await)),
            None => None,
        };

        let local_partition_provider = LocalPartitionProvider::new(
            partitions_root,
            object_store.clone(),
            "title_partitions".to_string(),
        );
        local_partition_provider.preload().await?;
        let partition_provider: Arc<dyn PartitionProvider> = Arc::new(local_partition_provider);

        let article_index_cache = Arc::new(ArticleIndexCache::new(
            local_cache_root,
            object_store.clone(),
            text_fetcher.clone(),
            embedder.clone(),
        ));

        let evidence_retriever = Arc::new(EvidenceRetriever::new(
            config.clone(),
            query_summarizer,
            partition_provider.clone(),
            article_index_cache,
            embedder,
        ));

        let primary_search: Arc<dyn SearchProvider> =
            match BraveSearchProvider::from_env(http_client.clone()) {
                Ok(p) => Arc::new(p),
                Err(_) => Arc::new(SearxngSearchProvider::from_env(http_client.clone())?),
            };
        let secondary_search: Arc<dyn SearchProvider> =
            match TavilySearchProvider::from_env(http_client.clone()) {
                Ok(p) => Arc::new(p),
                Err(_) => Arc::new(SearxngSearchProvider::from_env(http_client.clone())?),
            };

        let claim_processor = Arc::new(ClaimProcessor::new(
            config.clone(),
            evidence_retriever,
            judge,
            primary_search,
            secondary_search,
        ));

        let pipeline_driver = Arc::new(PipelineDriver::new(
            config.clone(),
            text_fetcher,
            claim_extractor,
            claim_reducer,
            claim_processor,
            keyword_extractor,
            summarizer,
            channel_classifier,
        ));

        Ok(Self {
            config,
            pipeline_driver,
            partition_provider,
        })
    }
}
