//! Read access to the remote archive (S3 compatible).

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ArchiveConfig;
use crate::error::{RefsError, Result};

/// Batched reads against the archive.
///
/// The fetch stage only needs whole-object reads of index files and size
/// queries of binary files.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Read a whole object.
    async fn fetch(&self, uri: &str) -> Result<Bytes>;

    /// Size of an object in bytes.
    async fn size(&self, uri: &str) -> Result<u64>;
}

/// Object-store backed archive reader.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ArchiveStore {
    /// Create a client for the archive bucket described by `config`.
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let bucket = config
            .bucket()
            .ok_or_else(|| RefsError::Config(format!("no bucket in '{}'", config.root)))?
            .to_string();

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region(&config.region);

        if config.anonymous {
            builder = builder.with_skip_signature(true);
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| RefsError::Config(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket,
        })
    }

    /// Wrap an existing store, e.g. `object_store::memory::InMemory` in tests.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Map `s3://{bucket}/{key}` to the object key within the bucket.
    pub fn object_path(&self, uri: &str) -> Result<Path> {
        uri.strip_prefix("s3://")
            .and_then(|rest| rest.strip_prefix(self.bucket.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(Path::from)
            .ok_or_else(|| {
                RefsError::fetch(uri, format!("not an object in bucket '{}'", self.bucket))
            })
    }
}

#[async_trait]
impl ArchiveReader for ArchiveStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn fetch(&self, uri: &str) -> Result<Bytes> {
        let location = self.object_path(uri)?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| RefsError::fetch(uri, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| RefsError::fetch(uri, format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn size(&self, uri: &str) -> Result<u64> {
        let location = self.object_path(uri)?;

        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| RefsError::fetch(uri, e))?;

        Ok(meta.size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn store() -> ArchiveStore {
        ArchiveStore::from_store(Arc::new(InMemory::new()), "noaa-gefs-retrospective")
    }

    #[test]
    fn test_object_path() {
        let path = store()
            .object_path("s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/x.grib2")
            .unwrap();
        assert_eq!(path.as_ref(), "GEFSv12/reforecast/2000/x.grib2");
    }

    #[test]
    fn test_object_path_other_bucket() {
        assert!(store().object_path("s3://other-bucket/key").is_err());
        assert!(store().object_path("/local/file").is_err());
    }

    #[tokio::test]
    async fn test_fetch_and_size() {
        let inner = Arc::new(InMemory::new());
        inner
            .put(&Path::from("GEFSv12/a.grib2"), Bytes::from_static(b"GRIB....7777").into())
            .await
            .unwrap();
        let store = ArchiveStore::from_store(inner, "bucket");

        let data = store.fetch("s3://bucket/GEFSv12/a.grib2").await.unwrap();
        assert_eq!(&data[..4], b"GRIB");
        assert_eq!(store.size("s3://bucket/GEFSv12/a.grib2").await.unwrap(), 12);
    }

    #[test]
    fn test_fetch_blocking() {
        let inner = Arc::new(InMemory::new());
        tokio_test::block_on(inner.put(&Path::from("idx"), Bytes::from_static(b"1:0:d=x").into()))
            .unwrap();
        let store = ArchiveStore::from_store(inner, "bucket");

        let data = tokio_test::block_on(store.fetch("s3://bucket/idx")).unwrap();
        assert_eq!(&data[..], b"1:0:d=x");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let result = store().size("s3://noaa-gefs-retrospective/missing.grib2").await;
        assert!(matches!(result, Err(RefsError::Fetch { .. })));
    }
}
