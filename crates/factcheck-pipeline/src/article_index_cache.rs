//! ArticleIndexCache (§4.1): per-URL body vector index materializer with
//! single-flight semantics and tiered (local dir / object store / fresh
//! fetch) caching.

use factcheck_core::{ArticleDocument, ArticleIndex, Embedder, ObjectStore, TextFetcher};
use factcheck_local::article_store::ArticleLocalStore;
use factcheck_local::url_norm::hash_url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;

const MIN_BODY_LEN: usize = 200;
const OBJECT_STORE_PREFIX: &str = "article_faiss_cache";

pub struct ArticleIndexCache {
    local: ArticleLocalStore,
    object_store: Option<Arc<dyn ObjectStore>>,
    text_fetcher: Arc<dyn TextFetcher>,
    embedder: Arc<dyn Embedder>,
    /// Per-URL single-flight lock table (§9: the map itself needs its own
    /// guard; never hold it across the build).
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ArticleIndexCache {
    pub fn new(
        local_root: std::path::PathBuf,
        object_store: Option<Arc<dyn ObjectStore>>,
        text_fetcher: Arc<dyn TextFetcher>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            local: ArticleLocalStore::new(local_root),
            object_store,
            text_fetcher,
            embedder,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, url: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        table
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn load_from_object_store(&self, url: &str) -> Option<ArticleIndex> {
        let store = self.object_store.as_ref()?;
        let prefix = format!("{OBJECT_STORE_PREFIX}/{}/", hash_url(url));
        let objs = store.get_prefix(&prefix).await.ok()?;
        let (_, bytes) = objs.into_iter().find(|(k, _)| k == "index.json")?;
        serde_json::from_slice::<StoredForTransfer>(&bytes)
            .ok()
            .map(|s| s.into_index(url))
    }

    async fn upload_best_effort(&self, index: &ArticleIndex) {
        let Some(store) = &self.object_store else {
            return;
        };
        let key = format!("{OBJECT_STORE_PREFIX}/{}/index.json", hash_url(&index.url));
        let payload = StoredForTransfer::from_index(index);
        if let Ok(bytes) = serde_json::to_vec(&payload) {
            // Best-effort: failure is not propagated (§4.1).
            if let Err(e) = store.put(&key, bytes).await {
                tracing::debug!(url = %index.url, error = %e, "article index upload failed");
            }
        }
    }

    /// `Get(url) -> ArticleIndex | absent` (§4.1).
    pub async fn get(&self, url: &str) -> Option<ArticleIndex> {
        let lock = self.lock_for(url);
        let _guard = lock.lock().await;

        if let Ok(Some(idx)) = self.local.get(url) {
            return Some(idx);
        }

        if let Some(idx) = self.load_from_object_store(url).await {
            if self.local.put(&idx).is_ok() {
                return Some(idx);
            }
            return Some(idx);
        }

        let body = match self.text_fetcher.fetch_article_body(url).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url, error = %e, "article body fetch failed");
                return None;
            }
        };
        if body.trim().chars().count() < MIN_BODY_LEN {
            tracing::debug!(url, "article body too short, discarding");
            return None;
        }

        let embedding = self
            .embedder
            .embed_documents(vec![body.clone()])
            .await
            .ok()
            .and_then(|mut v| v.pop())
            .unwrap_or_default();

        let index = ArticleIndex {
            url: url.to_string(),
            documents: vec![ArticleDocument {
                text: body,
                embedding,
            }],
        };

        let _ = self.local.put(&index);
        self.upload_best_effort(&index).await;
        Some(index)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredForTransfer {
    documents: Vec<(String, Vec<f32>)>,
}

impl StoredForTransfer {
    fn from_index(idx: &ArticleIndex) -> Self {
        Self {
            documents: idx
                .documents
                .iter()
                .map(|d| (d.text.clone(), d.embedding.clone()))
                .collect(),
        }
    }

    fn into_index(self, url: &str) -> ArticleIndex {
        ArticleIndex {
            url: url.to_string(),
            documents: self
                .documents
                .into_iter()
                .map(|(text, embedding)| ArticleDocument { text, embedding })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factcheck_core::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        body: String,
    }

    #[async_trait::async_trait]
    impl TextFetcher for CountingFetcher {
        async fn fetch_article_body(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(self.body.clone())
        }
        async fn fetch_transcript(&self, _url: &str) -> Result<String> {
            Err(Error::NotSupported("n/a".to_string()))
        }
    }

    struct StubEmbedder;
    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_documents(&self, docs: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(docs.iter().map(|_| vec![0.0, 0.0]).collect())
        }
        async fn embed_query(&self, _q: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0, 0.0])
        }
    }

    #[tokio::test]
    async fn single_flight_fetches_exactly_once_for_concurrent_callers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let long_body = "x".repeat(500);
        let fetcher = Arc::new(CountingFetcher {
            calls: calls.clone(),
            body: long_body,
        });
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ArticleIndexCache::new(
            tmp.path().to_path_buf(),
            None,
            fetcher,
            Arc::new(StubEmbedder),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = cache.clone();
            handles.push(tokio::spawn(async move { c.get("https://example.com/a").await }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_body_is_reported_absent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(CountingFetcher {
            calls,
            body: "too short".to_string(),
        });
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArticleIndexCache::new(tmp.path().to_path_buf(), None, fetcher, Arc::new(StubEmbedder));
        assert!(cache.get("https://example.com/b").await.is_none());
    }
}
