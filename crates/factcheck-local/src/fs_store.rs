//! Sharded local-directory blob store: `root/xx/yy/key.ext`, written with a
//! write-to-temp-then-rename so concurrent writers of the same key can race
//! without ever producing a corrupt file (§5 shared-resource policy).

use factcheck_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn shard_dir(&self, key: &str) -> PathBuf {
        let a = key.get(0..2).unwrap_or("00");
        let b = key.get(2..4).unwrap_or("00");
        self.root.join(a).join(b)
    }

    pub fn path(&self, key: &str, ext: &str) -> PathBuf {
        self.shard_dir(key).join(format!("{key}.{ext}"))
    }

    pub fn exists(&self, key: &str, ext: &str) -> bool {
        self.path(key, ext).exists()
    }

    pub fn read(&self, key: &str, ext: &str) -> Result<Option<Vec<u8>>> {
        let p = self.path(key, ext);
        if !p.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&p).map_err(|e| Error::Cache(e.to_string()))?))
    }

    pub fn write(&self, key: &str, ext: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.shard_dir(key);
        fs::create_dir_all(&dir).map_err(|e| Error::Cache(e.to_string()))?;
        let dest = self.path(key, ext);
        let tmp = dir.join(format!("{key}.{ext}.tmp.{}", std::process::id()));
        fs::write(&tmp, bytes).map_err(|e| Error::Cache(e.to_string()))?;
        fs::rename(&tmp, &dest).map_err(|e| Error::Cache(e.to_string()))?;
        Ok(())
    }

    /// Remove the shard subtree holding `key`'s files (used for corruption
    /// recovery, §4.1/§4.2: remove-then-refetch).
    pub fn remove_key(&self, key: &str, ext: &str) -> Result<()> {
        let p = self.path(key, ext);
        if p.exists() {
            fs::remove_file(&p).map_err(|e| Error::Cache(e.to_string()))?;
        }
        Ok(())
    }

    /// Remove an entire directory tree (used when a partition is fully
    /// rebuilt, keyed by directory name rather than a sharded key).
    pub fn remove_dir(&self, rel: &str) -> Result<()> {
        let p = self.root.join(rel);
        if p.exists() {
            fs::remove_dir_all(&p).map_err(|e| Error::Cache(e.to_string()))?;
        }
        Ok(())
    }

    pub fn dir(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
