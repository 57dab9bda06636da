#![allow(dead_code)]

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::Router;
use flight_price_service::{
    AppConfig, ArtifactPaths, FlightFeatures, ModelRegistry, build_router,
    config::{DEFAULT_CORS_ORIGIN, StorageConfig},
    features::{AIRLINES, CITIES, FEATURE_NAMES, TIMES_OF_DAY},
};
use serde_json::{Value, json};

/// Columns in an order unlike the request schema's declaration order.
pub fn training_ordering() -> Vec<String> {
    FEATURE_NAMES.iter().rev().map(|s| s.to_string()).collect()
}

fn stump(feature: usize, threshold: f32, left: f32, right: f32) -> Value {
    json!({
        "left_children": [1, -1, -1],
        "right_children": [2, -1, -1],
        "parents": [2147483647, 0, 0],
        "split_indices": [feature, 0, 0],
        "split_conditions": [threshold, left, right],
        "default_left": [0, 0, 0],
        "split_type": [0, 0, 0],
        "base_weights": [0.0, left, right],
        "tree_param": { "num_nodes": "3", "num_feature": "34", "size_leaf_vector": "1" }
    })
}

/// A three-tree regressor with base score 5000:
/// duration < 3 adds 1000 else 2500, Indigo subtracts 150 else adds 200,
/// business class adds 3000.
pub fn model_json(ordering: &[String], record_names: bool) -> Value {
    let column = |name: &str| ordering.iter().position(|c| c == name).unwrap_or(0);

    let mut learner = json!({
        "attributes": {},
        "feature_types": [],
        "gradient_booster": {
            "name": "gbtree",
            "model": {
                "gbtree_model_param": { "num_parallel_tree": "1", "num_trees": "3" },
                "iteration_indptr": [0, 1, 2, 3],
                "tree_info": [0, 0, 0],
                "trees": [
                    stump(column("duration"), 3.0, 1000.0, 2500.0),
                    stump(column("airline_Indigo"), 0.5, 200.0, -150.0),
                    stump(column("class"), 0.5, 0.0, 3000.0)
                ]
            }
        },
        "learner_model_param": {
            "base_score": "5E3",
            "boost_from_average": "1",
            "num_class": "0",
            "num_feature": ordering.len().to_string(),
            "num_target": "1"
        },
        "objective": {
            "name": "reg:squarederror",
            "reg_loss_param": { "scale_pos_weight": "1" }
        }
    });
    if record_names {
        learner["feature_names"] = json!(ordering);
    }

    json!({ "learner": learner, "version": [2, 1, 1] })
}

pub fn write_artifacts(dir: &Path, ordering: &[String], record_names: bool) -> ArtifactPaths {
    let model_dir = dir.join("model");
    fs::create_dir_all(&model_dir).unwrap();

    let paths = ArtifactPaths {
        model: model_dir.join("xgb_model.json"),
        feature_names: model_dir.join("feature_names.json"),
    };
    fs::write(
        &paths.model,
        serde_json::to_vec(&model_json(ordering, record_names)).unwrap(),
    )
    .unwrap();
    fs::write(&paths.feature_names, serde_json::to_vec(ordering).unwrap()).unwrap();
    paths
}

pub fn test_config(model_dir: PathBuf, strict_one_hot: bool) -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        storage: StorageConfig {
            endpoint: Some("http://localhost:9000".into()),
            unsigned: false,
            bucket: "flight-models".into(),
            model_key: "prod/xgb_model.json".into(),
            feature_names_key: "prod/feature_names.json".into(),
            timeout: Duration::from_secs(5),
        },
        model_dir,
        cors_allowed_origin: DEFAULT_CORS_ORIGIN.into(),
        strict_one_hot,
    }
}

pub fn router(dir: &Path, ordering: &[String], record_names: bool, strict: bool) -> Router {
    let paths = write_artifacts(dir, ordering, record_names);
    let registry = ModelRegistry::initialize(&paths).unwrap();
    let config = test_config(dir.join("model"), strict);
    build_router(Arc::new(config), Arc::new(registry)).unwrap()
}

/// Indigo, Delhi to Mumbai, morning departure, evening arrival, business
/// class, one stop.
pub fn scenario_pairs() -> Vec<(String, Value)> {
    FEATURE_NAMES
        .iter()
        .map(|name| {
            let value = match *name {
                "stops" => json!(1),
                "class" => json!(1),
                "duration" => json!(2.5),
                "days_left" => json!(10),
                "airline_Indigo" | "source_Delhi" | "destination_Mumbai"
                | "departure_Morning" | "arrival_Evening" => json!(1),
                _ => json!(0),
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Serializes key/value pairs in exactly the given order.
pub fn body_from_pairs(pairs: &[(String, Value)]) -> String {
    let fields: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
        .collect();
    format!("{{{}}}", fields.join(","))
}

pub fn scenario_body() -> String {
    body_from_pairs(&scenario_pairs())
}

/// A flight described by category names rather than indicator columns.
pub struct FlightSelection {
    pub stops: i64,
    pub class: i64,
    pub duration: f64,
    pub days_left: i64,
    pub airline: &'static str,
    pub source: &'static str,
    pub destination: &'static str,
    pub departure: &'static str,
    pub arrival: &'static str,
}

impl FlightSelection {
    /// Expands the category names into a full request record.
    pub fn encode(&self) -> FlightFeatures {
        let mut record = serde_json::Map::new();
        record.insert("stops".into(), json!(self.stops));
        record.insert("class".into(), json!(self.class));
        record.insert("duration".into(), json!(self.duration));
        record.insert("days_left".into(), json!(self.days_left));

        for (prefix, options, selected) in [
            ("airline", &AIRLINES, self.airline),
            ("source", &CITIES, self.source),
            ("destination", &CITIES, self.destination),
            ("departure", &TIMES_OF_DAY, self.departure),
            ("arrival", &TIMES_OF_DAY, self.arrival),
        ] {
            assert!(options.contains(&selected), "unknown {prefix} '{selected}'");
            for option in options.iter() {
                record.insert(
                    format!("{prefix}_{option}"),
                    json!(i64::from(*option == selected)),
                );
            }
        }

        serde_json::from_value(Value::Object(record)).unwrap()
    }
}
