//! S3-backed `ObjectStore` (§4.1 AMBIENT): the remote cache tier for both
//! the article-body cache (`article_faiss_cache/<hash>/`) and title
//! partitions (`<prefix>/partition_<id>/`). Writes are idempotent per key;
//! upload failures are the caller's concern to treat as best-effort.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use factcheck_core::{Error, ObjectStore, Result};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_from_env().await;
        let client = Client::new(&config);
        Self { client, bucket }
    }

    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(tok) = continuation.clone() {
                req = req.continuation_token(tok);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Error::Cache(format!("s3 list_objects_v2: {e}")))?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                let got = self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| Error::Cache(format!("s3 get_object {key}: {e}")))?;
                let bytes = got
                    .body
                    .collect()
                    .await
                    .map_err(|e| Error::Cache(format!("s3 body read {key}: {e}")))?
                    .into_bytes()
                    .to_vec();
                let suffix = key.strip_prefix(prefix).unwrap_or(key).to_string();
                out.push((suffix, bytes));
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(out)
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| Error::Cache(format!("s3 put_object {key}: {e}")))?;
        Ok(())
    }
}
