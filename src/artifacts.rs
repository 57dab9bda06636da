//! Download-if-absent for the model and feature-ordering artifacts.
//!
//! Runs once before the server binds. The local directory acts as a cache:
//! a file that already exists is trusted as-is and never re-fetched. Nothing
//! guards against two processes populating the same directory concurrently.

use std::{
    io,
    path::{Path, PathBuf},
    time::Instant,
};

use async_trait::async_trait;
use object_store::{
    ClientOptions, ObjectStore as _, aws::AmazonS3Builder, path::Path as ObjectPath,
};
use tokio::fs;
use tracing::{info, warn};

use crate::{
    config::{AppConfig, DEFAULT_UNSIGNED_ENDPOINT, StorageConfig},
    error::ServiceError,
};

/// Read access to an object storage bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Picks the signed S3 client unless unsigned access was asked for.
pub fn store_for(config: &StorageConfig) -> Result<Box<dyn ObjectStore>, ServiceError> {
    if config.unsigned {
        info!("object storage requests will not be signed");
        Ok(Box::new(HttpObjectStore::new(config)?))
    } else {
        Ok(Box::new(S3ObjectStore::from_config(config)))
    }
}

fn storage_error(bucket: &str, key: &str, err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(format!("s3://{bucket}/{key}: {err}"))
}

/// SigV4-signed S3 access. Credentials, region and session tokens come from
/// the standard `AWS_*` variables or the instance metadata service.
pub struct S3ObjectStore {
    builder: AmazonS3Builder,
}

impl S3ObjectStore {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(AmazonS3Builder::from_env(), config)
    }

    pub fn new(builder: AmazonS3Builder, config: &StorageConfig) -> Self {
        let mut builder =
            builder.with_client_options(ClientOptions::new().with_timeout(config.timeout));
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        Self { builder }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError> {
        let store = self
            .builder
            .clone()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| storage_error(bucket, key, e))?;

        let location = ObjectPath::from(key.trim_start_matches('/'));
        let body = store
            .get(&location)
            .await
            .map_err(|e| storage_error(bucket, key, e))?
            .bytes()
            .await
            .map_err(|e| storage_error(bucket, key, e))?;
        Ok(body.to_vec())
    }
}

/// Unsigned HTTP GET against a path-style endpoint
/// (`{endpoint}/{bucket}/{key}`), for public buckets and local MinIO.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, ServiceError> {
        let raw = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_UNSIGNED_ENDPOINT);
        let endpoint = reqwest::Url::parse(raw)
            .map_err(|e| ServiceError::Storage(format!("invalid endpoint '{raw}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(ServiceError::Storage(format!(
                "endpoint '{raw}' cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Storage(format!("failed to build http client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Each key segment is percent-encoded on its own, so `/` still
    /// separates segments.
    fn object_url(&self, bucket: &str, key: &str) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(bucket)
                .extend(key.split('/').filter(|s| !s.is_empty()));
        }
        url
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.object_url(bucket, key);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| storage_error(bucket, key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(storage_error(
                bucket,
                key,
                format!("server responded {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| storage_error(bucket, key, e))?;
        Ok(body.to_vec())
    }
}

/// Local locations of the two artifacts once they are known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub feature_names: PathBuf,
}

impl ArtifactPaths {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model_local_path(),
            feature_names: config.feature_names_local_path(),
        }
    }
}

/// Makes sure both artifacts are on local disk, fetching whichever is
/// missing. Returns the paths the model should be loaded from.
pub async fn ensure_local(
    store: &dyn ObjectStore,
    config: &AppConfig,
) -> Result<ArtifactPaths, ServiceError> {
    let paths = ArtifactPaths::from_config(config);
    let storage = &config.storage;

    ensure_object(store, &storage.bucket, &storage.model_key, &paths.model, "model").await?;
    ensure_object(
        store,
        &storage.bucket,
        &storage.feature_names_key,
        &paths.feature_names,
        "feature names",
    )
    .await?;

    info!("model artifacts ready");
    Ok(paths)
}

/// Returns whether a download happened.
pub async fn ensure_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: &Path,
    label: &str,
) -> Result<bool, ServiceError> {
    if fs::try_exists(path).await? {
        info!(artifact = label, path = %path.display(), "already present locally");
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    info!(artifact = label, "downloading from s3://{bucket}/{key}");
    let start = Instant::now();
    let body = store.get_object(bucket, key).await?;
    write_atomically(path, &body).await?;

    info!(
        artifact = label,
        bytes = body.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "download complete"
    );
    Ok(true)
}

/// Writes next to `path` and renames into place, so a crash mid-write never
/// leaves a file the next start would mistake for a complete artifact.
async fn write_atomically(path: &Path, body: &[u8]) -> Result<(), ServiceError> {
    let partial = partial_path(path);
    let written = async {
        fs::write(&partial, body).await?;
        fs::rename(&partial, path).await
    }
    .await;

    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(&partial).await {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(path = %partial.display(), error = %cleanup, "could not remove partial download");
            }
        }
        return Err(err.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
