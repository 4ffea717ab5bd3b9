//! LLM-backed collaborators, all built on the shared `OpenAiCompatClient`:
//! `Judge`, `ClaimExtractor`, `ClaimReducer`, `ChannelClassifier`,
//! `Embedder`, `KeywordExtractor`, `Summarizer`, `QuerySummarizer`.
//!
//! Each implementation owns its prompt (out of scope per spec §1) and a
//! stable output grammar the core parses (§4.4, §9).

use crate::openai_compat::OpenAiCompatClient;
use factcheck_core::{
    ChannelClassifier, ClaimExtractor, ClaimReducer, Embedder, Error, Judge, KeywordExtractor,
    QuerySummarizer, Relevance, Result, Summarizer, Verdict,
};
use std::sync::Arc;

/// Parse a stable `"<label>: <value>"` line grammar. Labels are matched
/// case-insensitively; unknown labels are ignored. Multi-line values are not
/// supported — each field occupies exactly one line, per §9.
fn parse_label_grammar(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let Some(idx) = line.find(':') else { continue };
        let label = line[..idx].trim().to_ascii_lowercase();
        let value = line[idx + 1..].trim().to_string();
        if label.is_empty() {
            continue;
        }
        out.push((label, value));
    }
    out
}

fn find_label<'a>(fields: &'a [(String, String)], label: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == label)
        .map(|(_, v)| v.as_str())
}

/// Parse the Judge's structured verdict text (§4.4). Missing `relevance` or
/// `justification` downgrades to `relevance=no`, per spec.
pub fn parse_judge_verdict(raw: &str) -> Verdict {
    let fields = parse_label_grammar(raw);
    let relevance_raw = find_label(&fields, "relevance");
    let justification = find_label(&fields, "justification");

    let relevance = match (relevance_raw, justification) {
        (Some(r), Some(j)) if !j.trim().is_empty() => {
            if r.trim().eq_ignore_ascii_case("yes") {
                Relevance::Yes
            } else {
                Relevance::No
            }
        }
        _ => Relevance::No,
    };

    Verdict {
        relevance,
        fact_description: find_label(&fields, "fact_description")
            .unwrap_or_default()
            .to_string(),
        justification: justification.unwrap_or_default().to_string(),
        snippet: find_label(&fields, "snippet").unwrap_or_default().to_string(),
    }
}

/// Parse the two-line channel-type grammar (§4.4 SUPPLEMENT).
pub fn parse_channel_type(raw: &str) -> (String, String) {
    let fields = parse_label_grammar(raw);
    let channel_type = find_label(&fields, "channel type")
        .or_else(|| find_label(&fields, "channel_type"))
        .unwrap_or_default()
        .to_string();
    let reason = find_label(&fields, "reason").unwrap_or_default().to_string();
    (channel_type, reason)
}

/// Parse `ClaimReducer`'s output: a JSON array of strings first; on parse
/// failure, fall back to line splitting, rejecting code-fence artifacts
/// (stray ``` lines), per §4.6 step 3.
pub fn parse_reduced_claims(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let fenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim())
        .and_then(|s| s.strip_suffix("```"))
        .map(|s| s.trim())
        .unwrap_or(trimmed);

    if let Ok(arr) = serde_json::from_str::<Vec<String>>(fenced) {
        return arr
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    raw.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && *l != "```" && *l != "```json")
        .map(|l| l.trim_start_matches(['-', '*', '•']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

pub struct LlmJudge {
    client: Arc<OpenAiCompatClient>,
}

impl LlmJudge {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const JUDGE_SYSTEM_PROMPT: &str = "You are a fact-checking judge. Given a claim and a body of \
text, decide whether the text supports or refutes the claim. Respond with exactly these labeled \
lines, one per line: \"relevance: yes\" or \"relevance: no\", \"fact_description: <one sentence>\", \
\"justification: <one sentence citing the text>\", \"snippet: <verbatim quote from the text>\".";

#[async_trait::async_trait]
impl Judge for LlmJudge {
    async fn evaluate(&self, claim: &str, body: &str) -> Result<Verdict> {
        let user = format!("Claim: {claim}\n\nText:\n{body}");
        match self
            .client
            .chat(JUDGE_SYSTEM_PROMPT, &user, 30_000, Some(300), Some(0.0), None)
            .await
        {
            Ok(raw) => Ok(parse_judge_verdict(&raw)),
            Err(e) => {
                tracing::warn!(error = %e, "judge LLM call failed, defaulting to not-relevant");
                Ok(Verdict {
                    relevance: Relevance::No,
                    fact_description: String::new(),
                    justification: String::new(),
                    snippet: String::new(),
                })
            }
        }
    }
}

pub struct LlmClaimExtractor {
    client: Arc<OpenAiCompatClient>,
}

impl LlmClaimExtractor {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const CLAIM_EXTRACTOR_SYSTEM_PROMPT: &str = "Extract the check-worthy factual claims from the \
following text. Respond with one claim per line, plain text, no numbering or bullets.";

#[async_trait::async_trait]
impl ClaimExtractor for LlmClaimExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let raw = self
            .client
            .chat(CLAIM_EXTRACTOR_SYSTEM_PROMPT, text, 30_000, Some(1000), Some(0.2), None)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(raw
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

pub struct LlmClaimReducer {
    client: Arc<OpenAiCompatClient>,
}

impl LlmClaimReducer {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const CLAIM_REDUCER_SYSTEM_PROMPT: &str = "Given a list of candidate claims, merge near-duplicates \
and return the distinct claims as a JSON array of strings, most important first.";

#[async_trait::async_trait]
impl ClaimReducer for LlmClaimReducer {
    async fn reduce(&self, claims: Vec<String>) -> Result<Vec<String>> {
        if claims.is_empty() {
            return Ok(Vec::new());
        }
        let user = claims.join("\n");
        let raw = self
            .client
            .chat_json(
                CLAIM_REDUCER_SYSTEM_PROMPT,
                &user,
                30_000,
                Some(1000),
                Some(0.0),
                None,
            )
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parse_reduced_claims(&raw))
    }
}

pub struct LlmChannelClassifier {
    client: Arc<OpenAiCompatClient>,
}

impl LlmChannelClassifier {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const CHANNEL_CLASSIFIER_SYSTEM_PROMPT: &str = "Classify the likely channel type of the speaker \
in this transcript (e.g. news outlet, commentary/opinion, independent creator). Respond with \
exactly: \"channel type: <value>\" then \"reason: <one sentence>\".";

#[async_trait::async_trait]
impl ChannelClassifier for LlmChannelClassifier {
    async fn classify(&self, transcript: &str) -> Result<(String, String)> {
        let raw = self
            .client
            .chat(
                CHANNEL_CLASSIFIER_SYSTEM_PROMPT,
                transcript,
                30_000,
                Some(150),
                Some(0.0),
                None,
            )
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parse_channel_type(&raw))
    }
}

pub struct LlmEmbedder {
    client: Arc<OpenAiCompatClient>,
}

impl LlmEmbedder {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Embedder for LlmEmbedder {
    async fn embed_documents(&self, docs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client
            .embeddings(docs, 60_000)
            .await
            .map_err(|e| Error::Llm(e.to_string()))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut v = self
            .client
            .embeddings(vec![query.to_string()], 60_000)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        v.pop()
            .ok_or_else(|| Error::Llm("embeddings returned no vectors".to_string()))
    }
}

pub struct LlmKeywordExtractor {
    client: Arc<OpenAiCompatClient>,
}

impl LlmKeywordExtractor {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const KEYWORD_SYSTEM_PROMPT: &str =
    "Extract up to 8 salient keywords from this text. Respond with a comma-separated list only.";

#[async_trait::async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract_keywords(&self, text: &str) -> Result<Vec<String>> {
        let raw = self
            .client
            .chat(KEYWORD_SYSTEM_PROMPT, text, 30_000, Some(100), Some(0.2), None)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(raw
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect())
    }
}

pub struct LlmSummarizer {
    client: Arc<OpenAiCompatClient>,
}

impl LlmSummarizer {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const THREE_LINE_SYSTEM_PROMPT: &str =
    "Summarize this text in exactly three short lines, plain text.";

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize_three_lines(&self, text: &str) -> Result<String> {
        self.client
            .chat(THREE_LINE_SYSTEM_PROMPT, text, 30_000, Some(200), Some(0.2), None)
            .await
            .map_err(|e| Error::Llm(e.to_string()))
    }
}

pub struct LlmQuerySummarizer {
    client: Arc<OpenAiCompatClient>,
}

impl LlmQuerySummarizer {
    pub fn new(client: Arc<OpenAiCompatClient>) -> Self {
        Self { client }
    }
}

const QUERY_SYSTEM_PROMPT: &str =
    "Rewrite this claim as a short web search query (under 12 words). Respond with only the query.";

#[async_trait::async_trait]
impl QuerySummarizer for LlmQuerySummarizer {
    async fn summarize_query(&self, claim: &str) -> Result<String> {
        self.client
            .chat(QUERY_SYSTEM_PROMPT, claim, 15_000, Some(40), Some(0.0), None)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| Error::Llm(e.to_string()))
    }
}
