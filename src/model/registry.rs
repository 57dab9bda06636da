use std::sync::Arc;

use tokio::task;

use crate::{
    artifacts::ArtifactPaths,
    error::ServiceError,
    features::FlightFeatures,
    model::{ModelMetadata, PredictionResponse, loader::ModelArtifacts},
};

/// Read-only handle to the loaded model, shared by every request.
pub struct ModelRegistry {
    artifacts: Arc<ModelArtifacts>,
}

impl ModelRegistry {
    pub fn initialize(paths: &ArtifactPaths) -> Result<Self, ServiceError> {
        let artifacts = ModelArtifacts::load(paths)?;
        Ok(Self::from_artifacts(artifacts))
    }

    pub fn from_artifacts(artifacts: ModelArtifacts) -> Self {
        Self {
            artifacts: Arc::new(artifacts),
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.artifacts.metadata()
    }

    pub async fn predict(
        &self,
        features: FlightFeatures,
    ) -> Result<PredictionResponse, ServiceError> {
        let artifacts = self.artifacts.clone();

        let prediction = task::spawn_blocking(move || predict_with(&artifacts, &features))
            .await
            .map_err(|err| ServiceError::Model(format!("inference task failed: {err}")))??;

        Ok(PredictionResponse { prediction })
    }
}

fn predict_with(artifacts: &ModelArtifacts, features: &FlightFeatures) -> Result<f64, ServiceError> {
    let row = features.project(&artifacts.feature_names)?;
    artifacts.booster.predict_row(&row)
}
