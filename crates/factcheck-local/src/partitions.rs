//! Local-directory + S3-backed `PartitionProvider` (§4.2, §6).
//!
//! Brute-force L2 k-NN over in-memory title vectors — no FFI to a native
//! FAISS library, since the on-disk format is opaque to the core and the
//! pack carries no such binding (§6 AMBIENT). Each partition is persisted
//! as a single `titles.json` file (an array of `{title, url, embedding}`)
//! under its own shard directory; this crate's own format, not a
//! FAISS-compatible one.

use factcheck_core::{Error, ObjectStore, PartitionHandle, Result, TitleMatch};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTitle {
    title: String,
    url: String,
    embedding: Vec<f32>,
}

/// Numeric suffix of a partition identifier, e.g. `partition_7` -> 7.
pub fn ordinal_of(id: &str) -> i64 {
    let digits: String = id.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    let digits: String = digits.chars().rev().collect();
    digits.parse().unwrap_or(0)
}

pub struct LocalPartitionHandle {
    id: String,
    ordinal: i64,
    titles: Vec<StoredTitle>,
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl PartitionHandle for LocalPartitionHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn ordinal(&self) -> i64 {
        self.ordinal
    }

    fn len(&self) -> usize {
        self.titles.len()
    }

    fn search(&self, query_vectors: &[Vec<f32>], k: usize) -> Vec<Vec<TitleMatch>> {
        query_vectors
            .iter()
            .map(|q| {
                let mut scored: Vec<TitleMatch> = self
                    .titles
                    .iter()
                    .map(|t| TitleMatch {
                        distance: l2_distance(q, &t.embedding),
                        title: t.title.clone(),
                        url: t.url.clone(),
                    })
                    .collect();
                scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(k);
                scored
            })
            .collect()
    }
}

pub struct LocalPartitionProvider {
    root: PathBuf,
    object_store: Option<Arc<dyn ObjectStore>>,
    object_store_prefix: String,
    partitions: RwLock<Arc<Vec<Arc<dyn PartitionHandle>>>>,
}

impl LocalPartitionProvider {
    pub fn new(
        root: PathBuf,
        object_store: Option<Arc<dyn ObjectStore>>,
        object_store_prefix: String,
    ) -> Self {
        Self {
            root,
            object_store,
            object_store_prefix,
            partitions: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn partition_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn load_from_disk(&self, id: &str) -> Result<Option<LocalPartitionHandle>> {
        let path = self.partition_dir(id).join("titles.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| Error::Cache(e.to_string()))?;
        let titles: Vec<StoredTitle> =
            serde_json::from_slice(&bytes).map_err(|e| Error::Cache(e.to_string()))?;
        Ok(Some(LocalPartitionHandle {
            id: id.to_string(),
            ordinal: ordinal_of(id),
            titles,
        }))
    }

    async fn load_from_object_store(&self, id: &str) -> Result<Option<LocalPartitionHandle>> {
        let Some(store) = &self.object_store else {
            return Ok(None);
        };
        let prefix = format!("{}/{}/", self.object_store_prefix.trim_end_matches('/'), id);
        let objs = store.get_prefix(&prefix).await?;
        let Some((_, bytes)) = objs.into_iter().find(|(k, _)| k == "titles.json") else {
            return Ok(None);
        };
        let dir = self.partition_dir(id);
        fs::create_dir_all(&dir).map_err(|e| Error::Cache(e.to_string()))?;
        fs::write(dir.join("titles.json"), &bytes).map_err(|e| Error::Cache(e.to_string()))?;
        let titles: Vec<StoredTitle> =
            serde_json::from_slice(&bytes).map_err(|e| Error::Cache(e.to_string()))?;
        Ok(Some(LocalPartitionHandle {
            id: id.to_string(),
            ordinal: ordinal_of(id),
            titles,
        }))
    }

    /// Discover partition directories under `root` and load each, tiered
    /// local-then-S3, then publish the initial snapshot (descending ordinal).
    pub async fn preload(&self) -> Result<()> {
        let mut ids: Vec<String> = Vec::new();
        if self.root.exists() {
            if let Ok(rd) = fs::read_dir(&self.root) {
                for ent in rd.flatten() {
                    if ent.path().is_dir() {
                        if let Some(name) = ent.file_name().to_str() {
                            ids.push(name.to_string());
                        }
                    }
                }
            }
        }

        let mut handles: Vec<Arc<dyn PartitionHandle>> = Vec::new();
        for id in ids {
            let handle = match self.load_from_disk(&id)? {
                Some(h) => h,
                None => match self.load_from_object_store(&id).await? {
                    Some(h) => h,
                    None => continue,
                },
            };
            if handle.len() == 0 {
                continue;
            }
            handles.push(Arc::new(handle));
        }
        handles.sort_by(|a, b| b.ordinal().cmp(&a.ordinal()));

        let mut w = self
            .partitions
            .write()
            .map_err(|_| Error::Cache("partition registry lock poisoned".to_string()))?;
        *w = Arc::new(handles);
        Ok(())
    }
}

#[async_trait::async_trait]
impl factcheck_core::PartitionProvider for LocalPartitionProvider {
    fn partitions(&self) -> Vec<Arc<dyn PartitionHandle>> {
        let snapshot = self
            .partitions
            .read()
            .map(|g| g.clone())
            .unwrap_or_else(|_| Arc::new(Vec::new()));
        snapshot.as_ref().clone()
    }

    async fn reload(&self, partition_id: &str) -> Result<()> {
        // Remove-then-refetch, per §4.2's reload trigger behavior.
        let dir = self.partition_dir(partition_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| Error::Cache(e.to_string()))?;
        }
        let Some(fresh) = self.load_from_object_store(partition_id).await? else {
            return Err(Error::Cache(format!(
                "partition {partition_id} not found in object store on reload"
            )));
        };
        let fresh: Arc<dyn PartitionHandle> = Arc::new(fresh);

        let mut w = self
            .partitions
            .write()
            .map_err(|_| Error::Cache("partition registry lock poisoned".to_string()))?;
        let mut next: Vec<Arc<dyn PartitionHandle>> = w
            .iter()
            .filter(|p| p.id() != partition_id)
            .cloned()
            .collect();
        next.push(fresh);
        next.sort_by(|a, b| b.ordinal().cmp(&a.ordinal()));
        *w = Arc::new(next);
        Ok(())
    }
}

/// Used by tests and small deployments to build an in-memory partition
/// without touching disk or S3.
pub fn in_memory_partition(id: &str, titles: Vec<(String, String, Vec<f32>)>) -> Arc<dyn PartitionHandle> {
    Arc::new(LocalPartitionHandle {
        id: id.to_string(),
        ordinal: ordinal_of(id),
        titles: titles
            .into_iter()
            .map(|(title, url, embedding)| StoredTitle { title, url, embedding })
            .collect(),
    })
}
