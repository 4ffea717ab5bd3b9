//! ClaimProcessor (§4.5): retrieval + judgment for one claim, with
//! alternate-provider and overflow-partition confidence cascades.

use crate::config::Config;
use crate::evidence_retriever::EvidenceRetriever;
use factcheck_core::{
    Claim, ClaimOutcome, ClaimResult, Evidence, EvidenceCandidate, Judge, Relevance,
    SearchProvider,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct ClaimProcessor {
    config: Arc<Config>,
    evidence_retriever: Arc<EvidenceRetriever>,
    judge: Arc<dyn Judge>,
    primary_search: Arc<dyn SearchProvider>,
    secondary_search: Arc<dyn SearchProvider>,
}

/// Result of one retrieval+judgment pass: accepted evidences plus the URLs
/// they consumed (so a subsequent cascade pass can exclude them).
struct PassResult {
    evidence: Vec<Evidence>,
    used_urls: HashSet<String>,
    confidence: u8,
}

impl ClaimProcessor {
    pub fn new(
        config: Arc<Config>,
        evidence_retriever: Arc<EvidenceRetriever>,
        judge: Arc<dyn Judge>,
        primary_search: Arc<dyn SearchProvider>,
        secondary_search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            config,
            evidence_retriever,
            judge,
            primary_search,
            secondary_search,
        }
    }

    pub async fn process(&self, claim: &Claim) -> ClaimResult {
        match self.process_inner(claim).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(claim = %claim.text, error = %e, "claim processing failed");
                ClaimResult {
                    claim: claim.text.clone(),
                    result: ClaimOutcome::Error,
                    confidence: 0,
                    evidence: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }

    async fn process_inner(&self, claim: &Claim) -> Result<ClaimResult, String> {
        let exclude = HashSet::new();
        let primary = self
            .run_pass(claim, self.primary_search.as_ref(), &exclude, |_| true)
            .await;
        tracing::debug!(confidence = primary.confidence, "primary pass complete");

        let mut best = primary;

        if best.confidence <= self.config.low_confidence_threshold {
            tracing::debug!(confidence = best.confidence, "low confidence, running secondary-provider cascade");
            let secondary = self
                .run_pass(
                    claim,
                    self.secondary_search.as_ref(),
                    &best.used_urls,
                    |_| true,
                )
                .await;
            if secondary.confidence > best.confidence {
                tracing::debug!(
                    from = best.confidence,
                    to = secondary.confidence,
                    "secondary cascade improved confidence"
                );
                best = secondary;
            }
        }

        if best.confidence <= self.config.low_confidence_threshold && !best.evidence.is_empty() {
            tracing::debug!(confidence = best.confidence, "low confidence, running overflow-partition cascade");
            let overflow_id = self.config.overflow_partition_id.clone();
            let overflow = self
                .run_pass(claim, self.primary_search.as_ref(), &best.used_urls, {
                    let overflow_id = overflow_id.clone();
                    move |id: &str| id.contains(&overflow_id)
                })
                .await;
            if overflow.confidence > best.confidence {
                tracing::debug!(
                    from = best.confidence,
                    to = overflow.confidence,
                    "overflow cascade improved confidence"
                );
                best = overflow;
            }
        }

        let outcome = if best.evidence.is_empty() {
            ClaimOutcome::InsufficientEvidence
        } else {
            ClaimOutcome::LikelyTrue
        };

        Ok(ClaimResult {
            claim: claim.text.clone(),
            result: outcome,
            confidence: best.confidence,
            evidence: best.evidence.into_iter().take(3).collect(),
            error: None,
        })
    }

    async fn run_pass(
        &self,
        claim: &Claim,
        search_provider: &dyn SearchProvider,
        exclude: &HashSet<String>,
        partition_filter: impl Fn(&str) -> bool + Clone,
    ) -> PassResult {
        let candidates = self
            .evidence_retriever
            .retrieve(claim, search_provider, exclude, partition_filter)
            .await;

        let accepted = self.judge_candidates(claim, candidates).await;
        let used_urls: HashSet<String> = exclude
            .iter()
            .cloned()
            .chain(accepted.iter().map(|e| e.url.clone()))
            .collect();
        let confidence = compute_confidence(&accepted);

        PassResult {
            evidence: accepted,
            used_urls,
            confidence,
        }
    }

    async fn judge_candidates(
        &self,
        claim: &Claim,
        candidates: Vec<EvidenceCandidate>,
    ) -> Vec<Evidence> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_judgments.max(1)));
        let mut accepted = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for batch in candidates.chunks(self.config.max_concurrent_judgments.max(1)) {
            if accepted.len() >= self.config.max_evidences_per_claim {
                break;
            }
            let mut tasks = Vec::new();
            for candidate in batch {
                if seen_urls.contains(&candidate.url) {
                    continue;
                }
                let judge = self.judge.clone();
                let sem = semaphore.clone();
                let claim_text = claim.text.clone();
                let candidate = candidate.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok()?;
                    let verdict = match judge.evaluate(&claim_text, &candidate.body_snippet).await {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(url = %candidate.url, error = %e, "judge evaluation failed");
                            return None;
                        }
                    };
                    if !matches!(verdict.relevance, Relevance::Yes) {
                        return None;
                    }
                    Some(Evidence {
                        url: candidate.url,
                        relevance: Relevance::Yes,
                        fact_check_result: verdict.fact_description,
                        justification: verdict.justification,
                        snippet: verdict.snippet,
                        source_title: candidate.matched_title,
                    })
                }));
            }

            for t in tasks {
                if let Ok(Some(evidence)) = t.await {
                    if seen_urls.insert(evidence.url.clone()) {
                        accepted.push(evidence);
                        if accepted.len() >= self.config.max_evidences_per_claim {
                            break;
                        }
                    }
                }
            }
        }

        accepted
    }
}

fn source_diversity_band(count: usize) -> u32 {
    match count {
        0 => 0,
        1 => 1,
        2 => 3,
        3 => 4,
        _ => 5,
    }
}

fn compute_confidence(evidence: &[Evidence]) -> u8 {
    let mut distinct_sources: HashSet<String> = HashSet::new();
    for e in evidence {
        distinct_sources.insert(e.diversity_key());
    }
    let source_diversity = source_diversity_band(distinct_sources.len());
    let evidence_count = evidence.len().min(5) as u32;
    let raw = (evidence_count * 12 + source_diversity * 8) as f32;
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(url: &str, source_title: Option<&str>) -> Evidence {
        Evidence {
            url: url.to_string(),
            relevance: Relevance::Yes,
            fact_check_result: "true".to_string(),
            justification: "because".to_string(),
            snippet: "snippet".to_string(),
            source_title: source_title.map(|s| s.to_string()),
        }
    }

    #[test]
    fn confidence_zero_evidence_is_zero() {
        assert_eq!(compute_confidence(&[]), 0);
    }

    #[test]
    fn confidence_caps_at_100_with_five_diverse_sources() {
        let ev: Vec<Evidence> = (0..5)
            .map(|i| evidence(&format!("https://s{i}.example.com/a"), None))
            .collect();
        assert_eq!(compute_confidence(&ev), 100);
    }

    #[test]
    fn confidence_with_single_source_repeated() {
        let ev = vec![
            evidence("https://a.example.com/1", Some("Same Outlet")),
            evidence("https://a.example.com/2", Some("Same Outlet")),
        ];
        // evidence_count=2 -> 24, source_diversity band for 1 distinct -> 1*8=8
        assert_eq!(compute_confidence(&ev), 32);
    }

    // S4: primary pass lands at the low-confidence threshold (one evidence,
    // one source); the secondary-provider cascade finds three evidences
    // from two distinct sources and wins. Final result takes the cascade's
    // confidence and evidence list, not the primary pass's.
    mod scenario_s4_cascade {
        use super::*;
        use crate::article_index_cache::ArticleIndexCache;
        use crate::evidence_retriever::EvidenceRetriever;
        use factcheck_core::{
            Embedder, PartitionHandle, PartitionProvider, QuerySummarizer, SearchQuery,
            SearchResponse, SearchResult, TextFetcher, TitleMatch, Verdict,
        };
        use std::collections::BTreeMap;

        fn l2(a: &[f32], b: &[f32]) -> f32 {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }

        /// Maps known cleaned titles to well-separated vectors so title
        /// k-NN matching is unambiguous (no ties, no cross-matches).
        struct KeyedEmbedder;
        #[async_trait::async_trait]
        impl Embedder for KeyedEmbedder {
            async fn embed_documents(
                &self,
                docs: Vec<String>,
            ) -> factcheck_core::Result<Vec<Vec<f32>>> {
                Ok(docs
                    .iter()
                    .map(|t| match t.as_str() {
                        "Primary Story" => vec![0.0, 0.0],
                        "Secondary A" => vec![10.0, 0.0],
                        "Secondary B" => vec![20.0, 0.0],
                        "Secondary C" => vec![30.0, 0.0],
                        _ => vec![999.0, 999.0],
                    })
                    .collect())
            }
            async fn embed_query(&self, _q: &str) -> factcheck_core::Result<Vec<f32>> {
                Ok(vec![0.0, 0.0])
            }
        }

        struct AlwaysRelevantJudge;
        #[async_trait::async_trait]
        impl Judge for AlwaysRelevantJudge {
            async fn evaluate(&self, _claim: &str, _body: &str) -> factcheck_core::Result<Verdict> {
                Ok(Verdict {
                    relevance: Relevance::Yes,
                    fact_description: "true".to_string(),
                    justification: "matches".to_string(),
                    snippet: "snippet".to_string(),
                })
            }
        }

        struct StubFetcher;
        #[async_trait::async_trait]
        impl TextFetcher for StubFetcher {
            async fn fetch_article_body(&self, _url: &str) -> factcheck_core::Result<String> {
                Ok("x".repeat(300))
            }
            async fn fetch_transcript(&self, _url: &str) -> factcheck_core::Result<String> {
                Err(factcheck_core::Error::NotSupported("n/a".to_string()))
            }
        }

        struct IdentityQuerySummarizer;
        #[async_trait::async_trait]
        impl QuerySummarizer for IdentityQuerySummarizer {
            async fn summarize_query(&self, claim: &str) -> factcheck_core::Result<String> {
                Ok(claim.to_string())
            }
        }

        struct FixedSearch {
            hits: Vec<(&'static str, &'static str)>,
        }
        #[async_trait::async_trait]
        impl SearchProvider for FixedSearch {
            fn name(&self) -> &'static str {
                "fixed"
            }
            async fn search(&self, _q: &SearchQuery) -> factcheck_core::Result<SearchResponse> {
                Ok(SearchResponse {
                    results: self
                        .hits
                        .iter()
                        .map(|(url, title)| SearchResult {
                            url: url.to_string(),
                            title: Some(title.to_string()),
                            snippet: None,
                            source: "fixed".to_string(),
                        })
                        .collect(),
                    provider: "fixed".to_string(),
                    cost_units: 0,
                    timings_ms: BTreeMap::new(),
                })
            }
        }

        /// Brute-force L2 partition over a fixed doc set, matching
        /// `factcheck-local`'s `LocalPartitionHandle`.
        struct VectorPartition {
            docs: Vec<(&'static str, Vec<f32>)>,
        }
        impl PartitionHandle for VectorPartition {
            fn id(&self) -> &str {
                "partition_1"
            }
            fn ordinal(&self) -> i64 {
                1
            }
            fn len(&self) -> usize {
                self.docs.len()
            }
            fn search(&self, query_vectors: &[Vec<f32>], k: usize) -> Vec<Vec<TitleMatch>> {
                query_vectors
                    .iter()
                    .map(|q| {
                        let mut scored: Vec<TitleMatch> = self
                            .docs
                            .iter()
                            .map(|(url, vec)| TitleMatch {
                                distance: l2(q, vec),
                                title: url.to_string(),
                                url: url.to_string(),
                            })
                            .collect();
                        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
                        scored.truncate(k);
                        scored
                    })
                    .collect()
            }
        }

        struct StaticPartitionProvider {
            handle: Arc<dyn PartitionHandle>,
        }
        #[async_trait::async_trait]
        impl PartitionProvider for StaticPartitionProvider {
            fn partitions(&self) -> Vec<Arc<dyn PartitionHandle>> {
                vec![self.handle.clone()]
            }
            async fn reload(&self, _partition_id: &str) -> factcheck_core::Result<()> {
                Ok(())
            }
        }

        #[tokio::test]
        async fn secondary_cascade_wins_over_low_confidence_primary() {
            let config = Arc::new(Config::default());
            let provider: Arc<dyn PartitionProvider> = Arc::new(StaticPartitionProvider {
                handle: Arc::new(VectorPartition {
                    docs: vec![
                        ("https://corpus.example.com/primary", vec![0.0, 0.0]),
                        ("https://corpus.example.com/s1", vec![10.0, 0.0]),
                        ("https://corpus.example.com/s2", vec![20.0, 0.0]),
                        ("https://corpus.example.com/s3", vec![30.0, 0.0]),
                    ],
                }),
            });
            let tmp = tempfile::tempdir().unwrap();
            let cache = Arc::new(ArticleIndexCache::new(
                tmp.path().to_path_buf(),
                None,
                Arc::new(StubFetcher),
                Arc::new(KeyedEmbedder),
            ));
            let retriever = Arc::new(EvidenceRetriever::new(
                config.clone(),
                Arc::new(IdentityQuerySummarizer),
                provider,
                cache,
                Arc::new(KeyedEmbedder),
            ));
            let primary_search: Arc<dyn SearchProvider> = Arc::new(FixedSearch {
                hits: vec![("https://raw.example.com/primary", "Primary Story")],
            });
            let secondary_search: Arc<dyn SearchProvider> = Arc::new(FixedSearch {
                hits: vec![
                    ("https://raw.example.com/s1", "Secondary A"),
                    ("https://raw.example.com/s2", "Secondary A"),
                    ("https://raw.example.com/s3", "Secondary C"),
                ],
            });
            let processor = ClaimProcessor::new(
                config,
                retriever,
                Arc::new(AlwaysRelevantJudge),
                primary_search,
                secondary_search,
            );

            let claim = Claim {
                text: "water boils at 100C at sea level".to_string(),
                position: 0,
            };
            let result = processor.process(&claim).await;

            // Primary: 1 evidence, 1 source -> 1*12 + 1*8 = 20 <= threshold(20),
            // so the secondary cascade runs. Secondary: 3 evidences, 2 distinct
            // sources ("Secondary A" x2, "Secondary C") -> 3*12 + 3*8 = 60.
            assert_eq!(result.confidence, 60);
            assert_eq!(result.result, ClaimOutcome::LikelyTrue);
            assert_eq!(result.evidence.len(), 3);
            let urls: HashSet<String> = result.evidence.iter().map(|e| e.url.clone()).collect();
            assert!(urls.contains("https://corpus.example.com/s1"));
            assert!(urls.contains("https://corpus.example.com/s2"));
            assert!(urls.contains("https://corpus.example.com/s3"));
            assert!(!urls.contains("https://corpus.example.com/primary"));
        }
    }
}
