use std::{fs, path::Path};

use tracing::{info, warn};

use crate::{
    artifacts::ArtifactPaths,
    error::ServiceError,
    features::FEATURE_NAMES,
    model::{Booster, ModelMetadata},
};

pub struct ModelArtifacts {
    pub booster: Booster,
    pub feature_names: Vec<String>,
    model_size_bytes: u64,
}

impl ModelArtifacts {
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ServiceError> {
        for path in [&paths.model, &paths.feature_names] {
            if !path.exists() {
                return Err(ServiceError::Artifact(format!(
                    "model artifact missing: {}",
                    path.display()
                )));
            }
        }

        let feature_names = load_feature_names(&paths.feature_names)?;
        let model_size_bytes = fs::metadata(&paths.model)?.len();
        let booster = Booster::from_path(&paths.model)?;

        let artifacts = Self::new(booster, feature_names, model_size_bytes)?;
        info!(
            trees = artifacts.booster.num_trees(),
            features = artifacts.feature_names.len(),
            objective = artifacts.booster.objective(),
            "model loaded"
        );
        Ok(artifacts)
    }

    /// Pairs a booster with its column ordering. Ordering names outside the
    /// request schema are allowed here and fail per request instead.
    pub fn new(
        booster: Booster,
        feature_names: Vec<String>,
        model_size_bytes: u64,
    ) -> Result<Self, ServiceError> {
        let recorded = booster.feature_names();
        if !recorded.is_empty() && recorded != feature_names.as_slice() {
            return Err(ServiceError::Artifact(
                "feature ordering does not match the names stored in the model".into(),
            ));
        }

        let unknown: Vec<&str> = feature_names
            .iter()
            .map(String::as_str)
            .filter(|name| !FEATURE_NAMES.contains(name))
            .collect();
        if !unknown.is_empty() {
            warn!(
                ?unknown,
                "feature ordering references columns the request schema does not provide"
            );
        }

        Ok(Self {
            booster,
            feature_names,
            model_size_bytes,
        })
    }

    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            objective: self.booster.objective().to_string(),
            num_trees: self.booster.num_trees(),
            num_features: self.booster.num_features(),
            base_score: self.booster.base_score(),
            model_size_bytes: self.model_size_bytes,
            feature_names: self.feature_names.clone(),
        }
    }
}

/// The ordering artifact is a JSON array of column names.
pub fn load_feature_names(path: &Path) -> Result<Vec<String>, ServiceError> {
    let raw = fs::read(path)?;
    let names: Vec<String> = serde_json::from_slice(&raw).map_err(|e| {
        ServiceError::Artifact(format!(
            "feature ordering {} is not a JSON array of strings: {e}",
            path.display()
        ))
    })?;
    if names.is_empty() {
        return Err(ServiceError::Artifact(format!(
            "feature ordering {} is empty",
            path.display()
        )));
    }
    Ok(names)
}
