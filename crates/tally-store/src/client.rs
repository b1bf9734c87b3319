//! Storage client: bucket handles plus the handful of operations the
//! updater needs.
//!
//! Backed by the `object_store` crate — Google Cloud Storage in
//! production, a shared in-memory set of buckets for tests. Handles are
//! cached per bucket; the underlying stores are safe for concurrent
//! use, so one client serves every worker.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::debug;

use crate::error::StoreError;
use crate::path::GcsPath;

use tally_core::encode::crc32c_of;

enum Backend {
    Gcs { service_account: Option<PathBuf> },
    Memory,
}

/// Bucket-name → store-handle cache over a single backend.
pub struct StorageClient {
    backend: Backend,
    buckets: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl StorageClient {
    /// Production client. `service_account` points at a credentials
    /// file; `None` uses ambient credentials.
    pub fn gcs(service_account: Option<PathBuf>) -> Self {
        Self {
            backend: Backend::Gcs { service_account },
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// In-memory client for tests. Buckets spring into existence on
    /// first use and persist for the client's lifetime.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for `bucket`, created on first use.
    pub fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = buckets.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::Memory => Arc::new(object_store::memory::InMemory::new()),
            Backend::Gcs { service_account } => {
                let mut builder =
                    GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
                if let Some(path) = service_account {
                    builder = builder.with_service_account_path(path.to_string_lossy());
                }
                Arc::new(builder.build()?)
            }
        };
        buckets.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Read an object in full.
    pub async fn get(&self, bucket: &str, object: &str) -> Result<Bytes, StoreError> {
        let store = self.bucket(bucket)?;
        let location = Path::from(object);
        let result = store
            .get(&location)
            .await
            .map_err(|e| StoreError::from_store(e, object))?;
        result
            .bytes()
            .await
            .map_err(|e| StoreError::from_store(e, object))
    }

    /// Read an object in full, mapping a missing object to `None`.
    pub async fn get_opt(&self, bucket: &str, object: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(bucket, object).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read an object in full, refusing payloads larger than `limit`
    /// bytes before fetching the body.
    pub async fn get_limited(
        &self,
        bucket: &str,
        object: &str,
        limit: u64,
    ) -> Result<Bytes, StoreError> {
        let store = self.bucket(bucket)?;
        let location = Path::from(object);
        let result = store
            .get(&location)
            .await
            .map_err(|e| StoreError::from_store(e, object))?;
        let size = result.meta.size as u64;
        if size > limit {
            return Err(StoreError::TooLarge {
                path: object.to_string(),
                size,
                limit,
            });
        }
        result
            .bytes()
            .await
            .map_err(|e| StoreError::from_store(e, object))
    }

    /// Immediate child "directories" of `prefix` (delimited listing);
    /// plain objects at that level are not directories and are ignored.
    /// Returned prefixes end with `/`.
    pub async fn list_dirs(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let store = self.bucket(bucket)?;
        let location = Path::from(prefix);
        let listing = store
            .list_with_delimiter(Some(&location))
            .await
            .map_err(|e| StoreError::from_store(e, prefix))?;
        Ok(listing
            .common_prefixes
            .iter()
            .map(|p| format!("{}/", p.as_ref()))
            .collect())
    }

    /// Names of every object under `prefix`, recursively.
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let store = self.bucket(bucket)?;
        let location = Path::from(prefix);
        let objects: Vec<_> = store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| StoreError::from_store(e, prefix))?;
        Ok(objects
            .into_iter()
            .map(|meta| meta.location.as_ref().to_string())
            .collect())
    }

    /// Upload `payload` to `path`, carrying the caller's Castagnoli
    /// checksum. The payload is verified against `crc32c` before
    /// anything is written, and the checksum is recorded on the object
    /// so readers can validate what the store holds.
    pub async fn put_with_crc32c(
        &self,
        path: &GcsPath,
        payload: Bytes,
        crc32c: u32,
    ) -> Result<(), StoreError> {
        let computed = crc32c_of(&payload);
        if computed != crc32c {
            return Err(StoreError::ChecksumMismatch {
                path: path.to_string(),
                computed,
                declared: crc32c,
            });
        }

        let store = self.bucket(path.bucket())?;
        let location = Path::from(path.object());
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::Metadata("crc32c".into()),
            format!("{crc32c:08x}").into(),
        );
        let opts = PutOptions {
            attributes,
            ..PutOptions::default()
        };
        let size = payload.len();
        store
            .put_opts(&location, PutPayload::from_bytes(payload), opts)
            .await
            .map_err(|e| StoreError::from_store(e, path.object()))?;
        debug!(path = %path, bytes = size, "uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_put_get_round_trip() {
        let client = StorageClient::memory();
        let path = GcsPath::parse("gs://bucket/dir/obj").unwrap();
        let payload = Bytes::from_static(b"hello grid");
        let crc = crc32c_of(&payload);

        client
            .put_with_crc32c(&path, payload.clone(), crc)
            .await
            .unwrap();
        let back = client.get("bucket", "dir/obj").await.unwrap();
        assert_eq!(back, payload);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_refused() {
        let client = StorageClient::memory();
        let path = GcsPath::parse("gs://bucket/obj").unwrap();
        let err = client
            .put_with_crc32c(&path, Bytes::from_static(b"data"), 0xDEAD_BEEF)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
        // Nothing was written.
        assert!(client.get_opt("bucket", "obj").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_opt_maps_missing_objects_to_none() {
        let client = StorageClient::memory();
        assert!(client.get_opt("bucket", "nope").await.unwrap().is_none());

        let err = client.get("bucket", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_dirs_returns_only_directories() {
        let client = StorageClient::memory();
        let store = client.bucket("bucket").unwrap();
        for name in [
            "logs/job/10/started.json",
            "logs/job/9/started.json",
            "logs/job/latest-build.txt",
        ] {
            store
                .put(&Path::from(name), PutPayload::from_bytes(Bytes::from_static(b"{}")))
                .await
                .unwrap();
        }

        let mut dirs = client.list_dirs("bucket", "logs/job/").await.unwrap();
        dirs.sort();
        assert_eq!(dirs, vec!["logs/job/10/", "logs/job/9/"]);
    }

    #[tokio::test]
    async fn list_objects_is_recursive() {
        let client = StorageClient::memory();
        let store = client.bucket("bucket").unwrap();
        for name in [
            "pre/artifacts/junit_01.xml",
            "pre/artifacts/nested/junit_02.xml",
            "pre/started.json",
        ] {
            store
                .put(&Path::from(name), PutPayload::from_bytes(Bytes::from_static(b"x")))
                .await
                .unwrap();
        }

        let mut names = client.list_objects("bucket", "pre/artifacts/").await.unwrap();
        names.sort();
        assert_eq!(
            names,
            vec![
                "pre/artifacts/junit_01.xml",
                "pre/artifacts/nested/junit_02.xml",
            ]
        );
    }

    #[tokio::test]
    async fn get_limited_refuses_oversized_objects() {
        let client = StorageClient::memory();
        let store = client.bucket("bucket").unwrap();
        store
            .put(&Path::from("big"), PutPayload::from_bytes(Bytes::from_static(b"0123456789")))
            .await
            .unwrap();

        let err = client.get_limited("bucket", "big", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { size: 10, .. }));
        assert!(client.get_limited("bucket", "big", 10).await.is_ok());
    }

    #[tokio::test]
    async fn buckets_are_isolated_but_stable() {
        let client = StorageClient::memory();
        let a = client.bucket("a").unwrap();
        a.put(&Path::from("obj"), PutPayload::from_bytes(Bytes::from_static(b"1")))
            .await
            .unwrap();

        // Same bucket name returns the same store.
        assert!(client.get_opt("a", "obj").await.unwrap().is_some());
        // A different bucket does not see it.
        assert!(client.get_opt("b", "obj").await.unwrap().is_none());
    }
}
