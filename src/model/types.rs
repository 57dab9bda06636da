use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub prediction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub objective: String,
    pub num_trees: usize,
    pub num_features: usize,
    pub base_score: f32,
    pub model_size_bytes: u64,
    pub feature_names: Vec<String>,
}
