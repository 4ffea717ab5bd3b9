//! Local-directory storage tier for `ArticleIndex` entries, keyed by
//! `hash_url` (§4.1 step 2/5). The single-flight coordination and tier
//! fallback algorithm live in `factcheck-pipeline`; this crate only
//! provides the sharded load/persist primitive.

use crate::fs_store::FsStore;
use crate::url_norm::hash_url;
use factcheck_core::{ArticleDocument, ArticleIndex, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    text: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredArticleIndex {
    url: String,
    documents: Vec<StoredDocument>,
}

#[derive(Debug, Clone)]
pub struct ArticleLocalStore {
    store: FsStore,
}

impl ArticleLocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            store: FsStore::new(root),
        }
    }

    pub fn key_for(url: &str) -> String {
        hash_url(url)
    }

    pub fn get(&self, url: &str) -> Result<Option<ArticleIndex>> {
        let key = Self::key_for(url);
        let Some(bytes) = self.store.read(&key, "json")? else {
            return Ok(None);
        };
        let stored: StoredArticleIndex = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                // Corruption recovery (§4.1): drop the bad entry and report absent.
                tracing::warn!(url, error = %e, "cached article index corrupt, evicting");
                let _ = self.store.remove_key(&key, "json");
                return Ok(None);
            }
        };
        Ok(Some(ArticleIndex {
            url: stored.url,
            documents: stored
                .documents
                .into_iter()
                .map(|d| ArticleDocument {
                    text: d.text,
                    embedding: d.embedding,
                })
                .collect(),
        }))
    }

    pub fn put(&self, index: &ArticleIndex) -> Result<()> {
        let key = Self::key_for(&index.url);
        let stored = StoredArticleIndex {
            url: index.url.clone(),
            documents: index
                .documents
                .iter()
                .map(|d| StoredDocument {
                    text: d.text.clone(),
                    embedding: d.embedding.clone(),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&stored).map_err(|e| Error::Cache(e.to_string()))?;
        self.store.write(&key, "json", &bytes)
    }

    pub fn remove(&self, url: &str) -> Result<()> {
        self.store.remove_key(&Self::key_for(url), "json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_article_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArticleLocalStore::new(tmp.path().to_path_buf());
        let idx = ArticleIndex {
            url: "https://example.com/a".to_string(),
            documents: vec![ArticleDocument {
                text: "body text".to_string(),
                embedding: vec![0.1, 0.2],
            }],
        };
        store.put(&idx).unwrap();
        let got = store.get("https://example.com/a").unwrap().unwrap();
        assert_eq!(got.url, idx.url);
        assert_eq!(got.documents.len(), 1);
        assert_eq!(got.documents[0].text, "body text");
    }

    #[test]
    fn near_duplicate_urls_share_a_cache_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArticleLocalStore::new(tmp.path().to_path_buf());
        let idx = ArticleIndex {
            url: "https://www.example.com/a/?utm_source=x".to_string(),
            documents: vec![],
        };
        store.put(&idx).unwrap();
        assert!(store.get("https://example.com/a").unwrap().is_some());
    }

    #[test]
    fn corrupted_entry_is_removed_and_reported_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArticleLocalStore::new(tmp.path().to_path_buf());
        let key = ArticleLocalStore::key_for("https://example.com/a");
        store.store.write(&key, "json", b"not json").unwrap();
        assert!(store.get("https://example.com/a").unwrap().is_none());
        assert!(!store.store.exists(&key, "json"));
    }
}
