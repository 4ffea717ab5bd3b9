//! Local/concrete implementations of the `factcheck-core` collaborator
//! traits: reqwest+yt-dlp text fetching, Brave/Tavily search, an
//! OpenAI-compatible LLM client backing Judge/ClaimExtractor/ClaimReducer/
//! ChannelClassifier/Embedder/KeywordExtractor/Summarizer, a sharded local
//! blob store, an S3 object store, and a brute-force title partition
//! provider.

pub mod article_store;
pub mod extract;
pub mod fs_store;
pub mod llm;
pub mod object_store;
pub mod openai_compat;
pub mod partitions;
pub mod search;
pub mod text_fetcher;
pub mod title_clean;
pub mod url_norm;
pub mod youtube;
