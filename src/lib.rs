pub mod artifacts;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod server;

pub use artifacts::{ArtifactPaths, ObjectStore, ensure_local, store_for};
pub use config::AppConfig;
pub use error::ServiceError;
pub use features::FlightFeatures;
pub use model::{ModelRegistry, PredictionResponse};
pub use server::build_router;
