mod booster;
mod loader;
mod registry;
mod types;

pub use booster::Booster;
pub use loader::{ModelArtifacts, load_feature_names};
pub use registry::ModelRegistry;
pub use types::{ModelMetadata, PredictionResponse};
