//! EvidenceRetriever (§4.3): two-stage search + title k-NN + body
//! materialization pipeline producing up to `MAX_ARTICLES_PER_CLAIM`
//! EvidenceCandidates for a single claim.

use crate::article_index_cache::ArticleIndexCache;
use crate::config::Config;
use factcheck_core::{
    Claim, EvidenceCandidate, PartitionProvider, QuerySummarizer, SearchProvider, SearchQuery,
};
use factcheck_local::title_clean::TitleCleaner;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct EvidenceRetriever {
    config: Arc<Config>,
    query_summarizer: Arc<dyn QuerySummarizer>,
    partition_provider: Arc<dyn PartitionProvider>,
    article_index_cache: Arc<ArticleIndexCache>,
    title_cleaner: TitleCleaner,
    embedder: Arc<dyn factcheck_core::Embedder>,
}

struct CleanedHit {
    raw_title: String,
    cleaned_title: String,
    url: String,
}

impl EvidenceRetriever {
    pub fn new(
        config: Arc<Config>,
        query_summarizer: Arc<dyn QuerySummarizer>,
        partition_provider: Arc<dyn PartitionProvider>,
        article_index_cache: Arc<ArticleIndexCache>,
        embedder: Arc<dyn factcheck_core::Embedder>,
    ) -> Self {
        Self {
            config,
            query_summarizer,
            partition_provider,
            article_index_cache,
            title_cleaner: TitleCleaner::default(),
            embedder,
        }
    }

    /// Retrieve evidence candidates for `claim` using `search_provider`,
    /// excluding `already_used` URLs, restricted to partitions for which
    /// `partition_filter` returns true.
    pub async fn retrieve(
        &self,
        claim: &Claim,
        search_provider: &dyn SearchProvider,
        already_used: &HashSet<String>,
        partition_filter: impl Fn(&str) -> bool,
    ) -> Vec<EvidenceCandidate> {
        let query = match self.query_summarizer.summarize_query(&claim.text).await {
            Ok(q) if !q.trim().is_empty() => q,
            _ => claim.text.clone(),
        };

        let hits = match search_provider
            .search(&SearchQuery {
                query: query.clone(),
                max_results: Some(10),
                language: None,
                country: None,
            })
            .await
        {
            Ok(resp) if !resp.results.is_empty() => resp.results,
            Ok(_) => {
                tracing::debug!(provider = search_provider.name(), "search returned no hits");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(provider = search_provider.name(), error = %e, "search failed");
                return Vec::new();
            }
        };

        let cleaned: Vec<CleanedHit> = hits
            .into_iter()
            .map(|hit| {
                let raw_title = hit.title.unwrap_or_default();
                CleanedHit {
                    cleaned_title: self.title_cleaner.clean(&raw_title),
                    raw_title,
                    url: hit.url,
                }
            })
            .filter(|h| !already_used.contains(&h.url))
            .collect();
        if cleaned.is_empty() {
            tracing::debug!("all search hits already used, nothing left to embed");
            return Vec::new();
        }

        let titles: Vec<String> = cleaned.iter().map(|h| h.cleaned_title.clone()).collect();
        let vectors = self.embed_with_retry(titles).await;

        let selected = match vectors {
            Some(vecs) => self.select_via_title_knn(&cleaned, vecs, &partition_filter, already_used),
            None => Vec::new(),
        };

        let selected = if selected.is_empty() {
            self.select_via_query_fallback(&query, &partition_filter, already_used)
                .await
                .into_iter()
                .map(|url| (url, None))
                .collect()
        } else {
            selected
        };

        self.materialize_bodies(selected).await
    }

    async fn embed_with_retry(&self, titles: Vec<String>) -> Option<Vec<Vec<f32>>> {
        match self.embedder.embed_documents(titles.clone()).await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "title embedding failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                match self.embedder.embed_documents(titles.clone()).await {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::debug!(error = %e, "title embedding failed again, final retry");
                        tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
                        match self.embedder.embed_documents(titles).await {
                            Ok(v) => Some(v),
                            Err(e) => {
                                tracing::warn!(error = %e, "title embedding failed after all retries");
                                None
                            }
                        }
                    }
                }
            }
        }
    }

    fn select_via_title_knn(
        &self,
        cleaned: &[CleanedHit],
        vectors: Vec<Vec<f32>>,
        partition_filter: &impl Fn(&str) -> bool,
        already_used: &HashSet<String>,
    ) -> Vec<(String, Option<String>)> {
        let mut selected: Vec<(String, Option<String>)> = Vec::new();
        let mut selected_set: HashSet<String> = HashSet::new();
        let max = self.config.max_articles_per_claim;

        let mut partitions = self.partition_provider.partitions();
        partitions.sort_by(|a, b| b.ordinal().cmp(&a.ordinal()));

        for partition in partitions {
            if !partition_filter(partition.id()) || partition.len() == 0 {
                continue;
            }
            if selected.len() >= max {
                break;
            }

            let matches_per_query = partition.search(&vectors, 3);
            let mut new_in_partition = 0usize;

            for (pos_idx, hit) in cleaned.iter().enumerate() {
                if selected.len() >= max {
                    break;
                }
                let Some(matches) = matches_per_query.get(pos_idx) else {
                    continue;
                };
                let best = matches
                    .iter()
                    .filter(|m| m.distance < self.config.distance_threshold)
                    .filter(|m| !selected_set.contains(&m.url))
                    .filter(|m| !already_used.contains(&m.url))
                    .min_by(|a, b| {
                        a.distance
                            .partial_cmp(&b.distance)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                if let Some(m) = best {
                    selected_set.insert(m.url.clone());
                    selected.push((m.url.clone(), Some(hit.raw_title.clone())));
                    new_in_partition += 1;
                }
            }

            if new_in_partition >= self.config.partition_stop_hits {
                break;
            }
        }

        selected
    }

    async fn select_via_query_fallback(
        &self,
        query: &str,
        partition_filter: &impl Fn(&str) -> bool,
        already_used: &HashSet<String>,
    ) -> Vec<String> {
        let query_vec = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, fallback retrieval yields nothing");
                return Vec::new();
            }
        };

        let mut partitions = self.partition_provider.partitions();
        partitions.sort_by(|a, b| b.ordinal().cmp(&a.ordinal()));

        let mut candidates: Vec<(String, f32)> = Vec::new();
        for partition in partitions {
            if !partition_filter(partition.id()) || partition.len() == 0 {
                continue;
            }
            let matches = partition.search(&[query_vec.clone()], 5);
            if let Some(top) = matches.into_iter().next() {
                for m in top {
                    if m.distance < self.config.distance_threshold && !already_used.contains(&m.url) {
                        candidates.push((m.url, m.distance));
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|(url, _)| seen.insert(url.clone()))
            .take(self.config.max_articles_per_claim)
            .map(|(url, _)| url)
            .collect()
    }

    async fn materialize_bodies(
        &self,
        selected: Vec<(String, Option<String>)>,
    ) -> Vec<EvidenceCandidate> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_body_fetches.max(1)));
        let mut tasks = Vec::new();
        for (url, matched_title) in selected {
            let cache = self.article_index_cache.clone();
            let sem = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                let index = cache.get(&url).await?;
                Some(EvidenceCandidate {
                    url: url.clone(),
                    body_snippet: index.concatenated_text(),
                    matched_title,
                })
            }));
        }

        let mut out = Vec::new();
        for t in tasks {
            if let Ok(Some(candidate)) = t.await {
                out.push(candidate);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article_index_cache::ArticleIndexCache;
    use factcheck_core::{
        Embedder, Error, PartitionHandle, Result, SearchResponse, SearchResult, TextFetcher,
        TitleMatch,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct StubSearch {
        results: Vec<SearchResult>,
    }
    #[async_trait::async_trait]
    impl SearchProvider for StubSearch {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn search(&self, _q: &SearchQuery) -> Result<SearchResponse> {
            Ok(SearchResponse {
                results: self.results.clone(),
                provider: "stub".to_string(),
                cost_units: 0,
                timings_ms: BTreeMap::new(),
            })
        }
    }

    struct EmptySearch;
    #[async_trait::async_trait]
    impl SearchProvider for EmptySearch {
        fn name(&self) -> &'static str {
            "empty"
        }
        async fn search(&self, _q: &SearchQuery) -> Result<SearchResponse> {
            Ok(SearchResponse {
                results: vec![],
                provider: "empty".to_string(),
                cost_units: 0,
                timings_ms: BTreeMap::new(),
            })
        }
    }

    struct IdentityQuerySummarizer;
    #[async_trait::async_trait]
    impl QuerySummarizer for IdentityQuerySummarizer {
        async fn summarize_query(&self, claim: &str) -> Result<String> {
            Ok(claim.to_string())
        }
    }

    struct StubEmbedder;
    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_documents(&self, docs: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(docs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        async fn embed_query(&self, _q: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct StubFetcher;
    #[async_trait::async_trait]
    impl TextFetcher for StubFetcher {
        async fn fetch_article_body(&self, _url: &str) -> Result<String> {
            Ok("x".repeat(300))
        }
        async fn fetch_transcript(&self, _url: &str) -> Result<String> {
            Err(Error::NotSupported("n/a".to_string()))
        }
    }

    struct OnePartition {
        id: String,
        titles: Vec<(String, String)>,
    }
    impl PartitionHandle for OnePartition {
        fn id(&self) -> &str {
            &self.id
        }
        fn ordinal(&self) -> i64 {
            1
        }
        fn len(&self) -> usize {
            self.titles.len()
        }
        fn search(&self, query_vectors: &[Vec<f32>], k: usize) -> Vec<Vec<TitleMatch>> {
            query_vectors
                .iter()
                .map(|_| {
                    self.titles
                        .iter()
                        .take(k)
                        .map(|(title, url)| TitleMatch {
                            distance: 0.1,
                            title: title.clone(),
                            url: url.clone(),
                        })
                        .collect()
                })
                .collect()
        }
    }

    struct StaticPartitionProvider {
        handles: Vec<Arc<dyn PartitionHandle>>,
    }
    #[async_trait::async_trait]
    impl PartitionProvider for StaticPartitionProvider {
        fn partitions(&self) -> Vec<Arc<dyn PartitionHandle>> {
            self.handles.clone()
        }
        async fn reload(&self, _partition_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn make_retriever(
        search_hits: Vec<SearchResult>,
    ) -> (EvidenceRetriever, Arc<dyn SearchProvider>) {
        let config = Arc::new(Config::default());
        let provider: Arc<dyn PartitionProvider> = Arc::new(StaticPartitionProvider {
            handles: vec![Arc::new(OnePartition {
                id: "partition_1".to_string(),
                titles: vec![("Example News".to_string(), "https://news.example.com/a".to_string())],
            })],
        });
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ArticleIndexCache::new(
            tmp.path().to_path_buf(),
            None,
            Arc::new(StubFetcher),
            Arc::new(StubEmbedder),
        ));
        let retriever = EvidenceRetriever::new(
            config,
            Arc::new(IdentityQuerySummarizer),
            provider,
            cache,
            Arc::new(StubEmbedder),
        );
        let search: Arc<dyn SearchProvider> = Arc::new(StubSearch {
            results: search_hits,
        });
        (retriever, search)
    }

    #[tokio::test]
    async fn empty_search_result_returns_empty_immediately() {
        let (retriever, _) = make_retriever(vec![]);
        let empty: Arc<dyn SearchProvider> = Arc::new(EmptySearch);
        let claim = Claim {
            text: "the sky is blue".to_string(),
            position: 0,
        };
        let out = retriever
            .retrieve(&claim, empty.as_ref(), &HashSet::new(), |_| true)
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn matched_candidate_is_materialized_with_body() {
        let (retriever, search) = make_retriever(vec![SearchResult {
            url: "https://news.example.com/a".to_string(),
            title: Some("Example News Headline".to_string()),
            snippet: None,
            source: "stub".to_string(),
        }]);
        let claim = Claim {
            text: "the sky is blue".to_string(),
            position: 0,
        };
        let out = retriever
            .retrieve(&claim, search.as_ref(), &HashSet::new(), |_| true)
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://news.example.com/a");
        assert!(!out[0].body_snippet.is_empty());
    }

    #[tokio::test]
    async fn already_used_urls_are_excluded() {
        let (retriever, search) = make_retriever(vec![SearchResult {
            url: "https://news.example.com/a".to_string(),
            title: Some("Example News Headline".to_string()),
            snippet: None,
            source: "stub".to_string(),
        }]);
        let mut used = HashSet::new();
        used.insert("https://news.example.com/a".to_string());
        let claim = Claim {
            text: "the sky is blue".to_string(),
            position: 0,
        };
        let out = retriever
            .retrieve(&claim, search.as_ref(), &used, |_| true)
            .await;
        assert!(out.is_empty());
    }

    /// A later cascade pass must not re-select a partition-matched URL the
    /// primary pass already returned, even though that URL never appears as
    /// a raw search-hit URL itself (title k-NN resolves a hit's title to an
    /// unrelated stored partition URL).
    #[tokio::test]
    async fn already_used_partition_url_is_excluded_from_title_knn_match() {
        let config = Arc::new(Config::default());
        let already_used_url = "https://partition.example.com/already-used".to_string();
        let fresh_url = "https://partition.example.com/fresh".to_string();
        let provider: Arc<dyn PartitionProvider> = Arc::new(StaticPartitionProvider {
            handles: vec![Arc::new(OnePartition {
                id: "partition_1".to_string(),
                titles: vec![
                    ("Title A".to_string(), already_used_url.clone()),
                    ("Title B".to_string(), fresh_url.clone()),
                ],
            })],
        });
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ArticleIndexCache::new(
            tmp.path().to_path_buf(),
            None,
            Arc::new(StubFetcher),
            Arc::new(StubEmbedder),
        ));
        let retriever = EvidenceRetriever::new(
            config,
            Arc::new(IdentityQuerySummarizer),
            provider,
            cache,
            Arc::new(StubEmbedder),
        );
        // Two distinct raw search hits, neither of which shares a URL with
        // the already-used partition entry -- the exclude set only ever
        // names partition-matched URLs fed back from a prior cascade pass.
        let search: Arc<dyn SearchProvider> = Arc::new(StubSearch {
            results: vec![
                SearchResult {
                    url: "https://raw.example.com/1".to_string(),
                    title: Some("Title A".to_string()),
                    snippet: None,
                    source: "stub".to_string(),
                },
                SearchResult {
                    url: "https://raw.example.com/2".to_string(),
                    title: Some("Title B".to_string()),
                    snippet: None,
                    source: "stub".to_string(),
                },
            ],
        });
        let mut used = HashSet::new();
        used.insert(already_used_url.clone());
        let claim = Claim {
            text: "the sky is blue".to_string(),
            position: 0,
        };
        let out = retriever
            .retrieve(&claim, search.as_ref(), &used, |_| true)
            .await;
        assert!(out.iter().all(|c| c.url != already_used_url));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, fresh_url);
    }

    /// S6: the same URL matches in two partitions. It must appear only once
    /// in the candidate list handed downstream to judgment.
    #[tokio::test]
    async fn scenario_s6_duplicate_url_across_partitions_is_deduplicated() {
        let config = Arc::new(Config::default());
        let shared_url = "https://news.example.com/a".to_string();
        let provider: Arc<dyn PartitionProvider> = Arc::new(StaticPartitionProvider {
            handles: vec![
                Arc::new(OnePartition {
                    id: "partition_2".to_string(),
                    titles: vec![("Example News".to_string(), shared_url.clone())],
                }),
                Arc::new(OnePartition {
                    id: "partition_1".to_string(),
                    titles: vec![("Example News".to_string(), shared_url.clone())],
                }),
            ],
        });
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ArticleIndexCache::new(
            tmp.path().to_path_buf(),
            None,
            Arc::new(StubFetcher),
            Arc::new(StubEmbedder),
        ));
        let retriever = EvidenceRetriever::new(
            config,
            Arc::new(IdentityQuerySummarizer),
            provider,
            cache,
            Arc::new(StubEmbedder),
        );
        let search: Arc<dyn SearchProvider> = Arc::new(StubSearch {
            results: vec![SearchResult {
                url: shared_url.clone(),
                title: Some("Example News Headline".to_string()),
                snippet: None,
                source: "stub".to_string(),
            }],
        });
        let claim = Claim {
            text: "the sky is blue".to_string(),
            position: 0,
        };
        let out = retriever
            .retrieve(&claim, search.as_ref(), &HashSet::new(), |_| true)
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, shared_url);
    }
}
