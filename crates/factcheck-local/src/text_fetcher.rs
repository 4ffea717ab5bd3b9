//! `TextFetcher` implementation: reqwest-backed HTML article body fetch and
//! yt-dlp-backed YouTube transcript fetch, grounded in the teacher's
//! `LocalFetcher`/`youtube` modules.

use crate::extract;
use crate::youtube;
use factcheck_core::{Error, Result, TextFetcher};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LocalTextFetcher {
    client: reqwest::Client,
}

impl LocalTextFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("factcheck-local/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Default for LocalTextFetcher {
    fn default() -> Self {
        Self::new().expect("reqwest client build is infallible for this configuration")
    }
}

#[async_trait::async_trait]
impl TextFetcher for LocalTextFetcher {
    async fn fetch_article_body(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Fetch(format!("article fetch HTTP {}", resp.status())));
        }
        let html = resp.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(extract::extract_article_body(&html))
    }

    async fn fetch_transcript(&self, video_url: &str) -> Result<String> {
        let mode = youtube::youtube_transcripts_mode_from_env();
        if mode == "off" {
            return Err(Error::NotSupported(
                "youtube transcripts disabled via FACTCHECK_YOUTUBE_TRANSCRIPTS=off".to_string(),
            ));
        }
        let url_s = video_url.to_string();
        tokio::task::spawn_blocking(move || {
            youtube::fetch_transcript_via_ytdlp(&url_s, Duration::from_secs(30))
        })
        .await
        .map_err(|e| Error::Fetch(format!("transcript join failed: {e}")))?
        .map_err(Error::Fetch)
    }
}
