//! PipelineDriver (§4.6): end-to-end request processing — source text
//! acquisition, claim extraction/reduction, per-claim fan-out, auxiliary
//! metadata, and weighted aggregate confidence.

use crate::claim_processor::ClaimProcessor;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use factcheck_core::{
    AuxiliaryMetadata, ChannelClassifier, Claim, ClaimExtractor, ClaimReducer, ClaimResult,
    KeywordExtractor, PipelineResult, SourceDescriptor, Summarizer, TextFetcher, MAX_CLAIMS,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct PipelineDriver {
    config: Arc<Config>,
    text_fetcher: Arc<dyn TextFetcher>,
    claim_extractor: Arc<dyn ClaimExtractor>,
    claim_reducer: Arc<dyn ClaimReducer>,
    claim_processor: Arc<ClaimProcessor>,
    keyword_extractor: Arc<dyn KeywordExtractor>,
    summarizer: Arc<dyn Summarizer>,
    channel_classifier: Arc<dyn ChannelClassifier>,
}

impl PipelineDriver {
    pub fn new(
        config: Arc<Config>,
        text_fetcher: Arc<dyn TextFetcher>,
        claim_extractor: Arc<dyn ClaimExtractor>,
        claim_reducer: Arc<dyn ClaimReducer>,
        claim_processor: Arc<ClaimProcessor>,
        keyword_extractor: Arc<dyn KeywordExtractor>,
        summarizer: Arc<dyn Summarizer>,
        channel_classifier: Arc<dyn ChannelClassifier>,
    ) -> Self {
        Self {
            config,
            text_fetcher,
            claim_extractor,
            claim_reducer,
            claim_processor,
            keyword_extractor,
            summarizer,
            channel_classifier,
        }
    }

    pub async fn run_video(&self, video_id: &str, video_url: &str) -> Result<PipelineResult> {
        let transcript = self
            .text_fetcher
            .fetch_transcript(video_url)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(video_url, error = %e, "transcript fetch failed");
                String::new()
            });
        if transcript.trim().is_empty() {
            return Err(PipelineError::SourceUnavailable(video_url.to_string()));
        }
        let source = SourceDescriptor::Video {
            video_id: video_id.to_string(),
            video_url: video_url.to_string(),
        };
        self.run(source, transcript, true).await
    }

    pub async fn run_article(&self, article_url: &str) -> Result<PipelineResult> {
        let body = self
            .text_fetcher
            .fetch_article_body(article_url)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(article_url, error = %e, "article body fetch failed");
                String::new()
            });
        if body.trim().is_empty() {
            return Err(PipelineError::SourceUnavailable(article_url.to_string()));
        }
        let source = SourceDescriptor::Article {
            article_url: article_url.to_string(),
        };
        self.run(source, body, false).await
    }

    async fn run(
        &self,
        source: SourceDescriptor,
        text: String,
        is_video: bool,
    ) -> Result<PipelineResult> {
        let raw_claims = self
            .claim_extractor
            .extract(&text)
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        let reduced = self
            .claim_reducer
            .reduce(raw_claims)
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        let claims: Vec<Claim> = reduced
            .into_iter()
            .take(self.config.max_claims_to_fact_check.min(MAX_CLAIMS))
            .enumerate()
            .map(|(position, text)| Claim { text, position })
            .collect();
        tracing::debug!(claim_count = claims.len(), "claims reduced");

        let aux_fut = self.compute_auxiliary(&text, is_video);

        if claims.is_empty() {
            tracing::info!("no claims extracted, returning insufficient_claims result");
            let aux = aux_fut.await;
            return Ok(PipelineResult {
                source,
                aggregate_confidence: 0,
                summary: "insufficient_claims: 0".to_string(),
                claims: Vec::new(),
                aux,
                created_at: chrono::Utc::now(),
            });
        }

        let claim_results_fut = self.fan_out_claims(&claims);

        let (claim_results, aux) = tokio::join!(claim_results_fut, aux_fut);

        let aggregate_confidence = compute_aggregate_confidence(&claim_results);
        let summary = build_summary(&claim_results);
        tracing::info!(aggregate_confidence, %summary, "pipeline run complete");

        Ok(PipelineResult {
            source,
            aggregate_confidence,
            summary,
            claims: claim_results,
            aux,
            created_at: chrono::Utc::now(),
        })
    }

    async fn fan_out_claims(&self, claims: &[Claim]) -> Vec<ClaimResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_claims.max(1)));
        let mut tasks = Vec::with_capacity(claims.len());
        for claim in claims {
            let processor = self.claim_processor.clone();
            let sem = semaphore.clone();
            let claim = claim.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore never closed");
                processor.process(&claim).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (idx, t) in tasks.into_iter().enumerate() {
            let result = match t.await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(claim = %claims[idx].text, error = %e, "claim processing task failed");
                    ClaimResult {
                        claim: claims[idx].text.clone(),
                        result: factcheck_core::ClaimOutcome::Error,
                        confidence: 0,
                        evidence: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }
        results
    }

    async fn compute_auxiliary(&self, text: &str, is_video: bool) -> AuxiliaryMetadata {
        let keywords = self.keyword_extractor.extract_keywords(text).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "keyword extraction failed");
            Vec::new()
        });
        let three_line_summary =
            self.summarizer.summarize_three_lines(text).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "three-line summarization failed");
                String::new()
            });

        let (channel_type, channel_type_reason) = if is_video {
            match self.channel_classifier.classify(text).await {
                Ok((t, r)) => (Some(t), Some(r)),
                Err(e) => {
                    tracing::warn!(error = %e, "channel classification failed");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        AuxiliaryMetadata {
            keywords,
            three_line_summary,
            channel_type,
            channel_type_reason,
        }
    }
}

fn compute_aggregate_confidence(results: &[ClaimResult]) -> u8 {
    let mut weighted_sum = 0.0f64;
    let mut weight_sum = 0.0f64;

    for r in results {
        let evidence_count = r.evidence.len();
        let confidence = if r.confidence == 0 && evidence_count == 0 {
            10.0
        } else {
            r.confidence as f64
        };
        let evidence_weight = (evidence_count + 1).min(5) as f64;
        let confidence_weight = (confidence / 20.0).max(0.5);
        let weight = evidence_weight * confidence_weight;

        weighted_sum += confidence * weight;
        weight_sum += weight;
    }

    if weight_sum == 0.0 {
        0
    } else {
        (weighted_sum / weight_sum).round().clamp(0.0, 100.0) as u8
    }
}

fn build_summary(results: &[ClaimResult]) -> String {
    if results.len() >= 3 {
        let likely_true = results
            .iter()
            .filter(|r| matches!(r.result, factcheck_core::ClaimOutcome::LikelyTrue))
            .count();
        let pct = likely_true as f64 / results.len() as f64 * 100.0;
        format!("{pct:.1}% of claims with evidence")
    } else {
        format!("insufficient_claims: {}", results.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factcheck_core::{ClaimOutcome, Evidence, Relevance};

    fn result_with(confidence: u8, evidence_count: usize, outcome: ClaimOutcome) -> ClaimResult {
        let evidence = (0..evidence_count)
            .map(|i| Evidence {
                url: format!("https://s{i}.example.com"),
                relevance: Relevance::Yes,
                fact_check_result: "true".to_string(),
                justification: "j".to_string(),
                snippet: "s".to_string(),
                source_title: None,
            })
            .collect();
        ClaimResult {
            claim: "c".to_string(),
            result: outcome,
            confidence,
            evidence,
            error: None,
        }
    }

    #[test]
    fn aggregate_is_zero_with_no_claims() {
        assert_eq!(compute_aggregate_confidence(&[]), 0);
    }

    #[test]
    fn aggregate_applies_floor_substitution_for_zero_confidence_zero_evidence() {
        let results = vec![result_with(0, 0, ClaimOutcome::InsufficientEvidence)];
        // weight = min(1,5)*max(10/20,0.5) = 1*0.5 = 0.5; weighted=10*0.5=5; agg=5/0.5=10
        assert_eq!(compute_aggregate_confidence(&results), 10);
    }

    #[test]
    fn summary_reports_insufficient_claims_under_three() {
        let results = vec![result_with(50, 1, ClaimOutcome::LikelyTrue)];
        assert_eq!(build_summary(&results), "insufficient_claims: 1");
    }

    #[test]
    fn summary_reports_percent_with_three_or_more_claims() {
        let results = vec![
            result_with(50, 1, ClaimOutcome::LikelyTrue),
            result_with(50, 1, ClaimOutcome::LikelyTrue),
            result_with(0, 0, ClaimOutcome::InsufficientEvidence),
        ];
        assert_eq!(build_summary(&results), "66.7% of claims with evidence");
    }

    /// S1 from the testable-properties scenarios: 3 claims, each with 3
    /// accepted evidences from 3 distinct sources.
    #[test]
    fn scenario_s1_happy_path_three_claims_all_diverse() {
        let make = || {
            let evidence = (0..3)
                .map(|i| Evidence {
                    url: format!("https://s{i}.example.com/a"),
                    relevance: Relevance::Yes,
                    fact_check_result: "true".to_string(),
                    justification: "j".to_string(),
                    snippet: "s".to_string(),
                    source_title: None,
                })
                .collect::<Vec<_>>();
            // evidence_count=3 -> 36, source_diversity=3 -> 32, confidence=68
            ClaimResult {
                claim: "c".to_string(),
                result: ClaimOutcome::LikelyTrue,
                confidence: 68,
                evidence,
                error: None,
            }
        };
        let results = vec![make(), make(), make()];
        assert_eq!(compute_aggregate_confidence(&results), 68);
        assert_eq!(build_summary(&results), "100.0% of claims with evidence");
    }

    /// S3: 5 claims, all rejected at the judge stage (confidence=0,
    /// zero evidence each) -> floor-substituted aggregate of 10.
    #[test]
    fn scenario_s3_all_claims_rejected() {
        let results = (0..5)
            .map(|_| result_with(0, 0, ClaimOutcome::InsufficientEvidence))
            .collect::<Vec<_>>();
        assert_eq!(compute_aggregate_confidence(&results), 10);
        assert_eq!(build_summary(&results), "0.0% of claims with evidence");
    }
}
