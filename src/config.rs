use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;

pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_UNSIGNED_ENDPOINT: &str = "https://s3.amazonaws.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub storage: StorageConfig,
    pub model_dir: PathBuf,
    pub cors_allowed_origin: String,
    pub strict_one_hot: bool,
}

/// Where the model artifacts live in object storage.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Overrides the AWS endpoint, e.g. for MinIO. `None` uses the region's
    /// default S3 endpoint.
    pub endpoint: Option<String>,
    /// Skip request signing and fetch with plain GETs.
    pub unsigned: bool,
    pub bucket: String,
    pub model_key: String,
    pub feature_names_key: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any name-to-value source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into());
        let listen_addr = raw_addr
            .trim()
            .parse()
            .with_context(|| format!("SERVER_ADDR '{raw_addr}' is not a socket address"))?;

        let bucket = required(&lookup, "S3_BUCKET_NAME")?;
        let model_key = required(&lookup, "S3_MODEL_KEY")?;
        let feature_names_key = required(&lookup, "S3_FEATURE_NAMES_KEY")?;

        let endpoint = lookup("S3_ENDPOINT")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());
        let unsigned = lookup("S3_UNSIGNED")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let timeout = lookup("STORAGE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let model_dir = PathBuf::from(lookup("MODEL_DIR").unwrap_or_else(|| "model".to_string()));
        let cors_allowed_origin =
            lookup("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        let strict_one_hot = lookup("STRICT_ONE_HOT")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            storage: StorageConfig {
                endpoint,
                unsigned,
                bucket,
                model_key,
                feature_names_key,
                timeout,
            },
            model_dir,
            cors_allowed_origin,
            strict_one_hot,
        })
    }

    /// Local cache path of the serialized model.
    pub fn model_local_path(&self) -> PathBuf {
        local_path(&self.model_dir, &self.storage.model_key)
    }

    /// Local cache path of the serialized feature ordering.
    pub fn feature_names_local_path(&self) -> PathBuf {
        local_path(&self.model_dir, &self.storage.feature_names_key)
    }
}

fn required<F>(lookup: &F, name: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).with_context(|| format!("{name} must be set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Objects are cached under their key's basename, so `models/v3/xgb.json`
/// lands at `<dir>/xgb.json`.
fn local_path(dir: &Path, key: &str) -> PathBuf {
    let basename = key.rsplit('/').next().unwrap_or(key);
    dir.join(basename)
}
