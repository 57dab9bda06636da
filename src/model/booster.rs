//! Gradient-boosted tree ensemble read from XGBoost's JSON model format.
//!
//! Only what a single-output regressor needs is supported: `gbtree` and
//! `dart` boosters with numerical splits. Evaluation mirrors XGBoost's CPU
//! predictor: features and leaf values are `f32`, a node sends a row left
//! when `value < split_condition`, NaN takes the node's default direction,
//! and leaf values accumulate onto the base margin in tree order.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterDocument,
    learner_model_param: LearnerParams,
    objective: ObjectiveDocument,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
enum BoosterDocument {
    Gbtree {
        model: TreeEnsembleDocument,
    },
    Dart {
        gbtree: DartInner,
        weight_drop: Vec<f32>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct DartInner {
    model: TreeEnsembleDocument,
}

#[derive(Debug, Deserialize)]
struct TreeEnsembleDocument {
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older writers emit `default_left` as booleans, newer ones as 0/1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LearnerParams {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDocument {
    name: String,
}

/// Maps the raw margin to the objective's output space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    Logistic,
    Exp,
}

impl Link {
    fn for_objective(name: &str) -> Result<Self, ServiceError> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror"
            | "reg:pseudohubererror" | "reg:absoluteerror" | "reg:quantileerror"
            | "binary:logitraw" => Ok(Link::Identity),
            "reg:logistic" | "binary:logistic" => Ok(Link::Logistic),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Link::Exp),
            other => Err(ServiceError::Artifact(format!(
                "unsupported objective '{other}'"
            ))),
        }
    }

    /// Inverse of [`Link::apply`], used to turn the stored base score into a
    /// starting margin.
    fn to_margin(self, base_score: f32) -> f32 {
        match self {
            Link::Identity => base_score,
            Link::Logistic => (base_score / (1.0 - base_score)).ln(),
            Link::Exp => base_score.ln(),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Link::Identity => margin,
            Link::Logistic => 1.0 / (1.0 + (-margin).exp()),
            Link::Exp => margin.exp(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    left: u32,
    right: u32,
    feature: u32,
    /// Split threshold for inner nodes, leaf value for leaves.
    value: f32,
    default_left: bool,
    leaf: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_document(idx: usize, doc: TreeDocument) -> Result<Self, ServiceError> {
        let len = doc.left_children.len();
        let invalid = |reason: String| ServiceError::Artifact(format!("tree {idx}: {reason}"));

        if len == 0 {
            return Err(invalid("tree has no nodes".into()));
        }
        if doc.right_children.len() != len
            || doc.split_indices.len() != len
            || doc.split_conditions.len() != len
            || doc.default_left.len() != len
        {
            return Err(invalid("node arrays have different lengths".into()));
        }
        if doc.split_type.iter().any(|t| *t != 0) {
            return Err(invalid("categorical splits are not supported".into()));
        }

        let mut nodes = Vec::with_capacity(len);
        for n in 0..len {
            let (left, right) = (doc.left_children[n], doc.right_children[n]);
            let leaf = left == -1;
            if leaf {
                if right != -1 {
                    return Err(invalid(format!("node {n} has only one child")));
                }
            } else {
                // Children always follow their parent, which rules out cycles.
                for child in [left, right] {
                    if child <= n as i32 || child as usize >= len {
                        return Err(invalid(format!(
                            "node {n} has out-of-order child {child}"
                        )));
                    }
                }
            }
            nodes.push(Node {
                left: left.max(0) as u32,
                right: right.max(0) as u32,
                feature: doc.split_indices[n],
                value: doc.split_conditions[n],
                default_left: doc.default_left[n].is_set(),
                leaf,
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.leaf {
                return node.value;
            }
            let fvalue = row[node.feature as usize];
            let go_left = if fvalue.is_nan() {
                node.default_left
            } else {
                fvalue < node.value
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }

    fn max_feature(&self) -> Option<u32> {
        self.nodes
            .iter()
            .filter(|n| !n.leaf)
            .map(|n| n.feature)
            .max()
    }
}

/// An immutable, loaded tree ensemble.
#[derive(Debug, Clone)]
pub struct Booster {
    trees: Vec<Tree>,
    tree_weights: Vec<f32>,
    objective: String,
    link: Link,
    base_score: f32,
    base_margin: f32,
    num_features: usize,
    feature_names: Vec<String>,
}

impl Booster {
    pub fn from_path(path: &Path) -> Result<Self, ServiceError> {
        let raw = fs::read(path)?;
        Self::from_json_slice(&raw)
    }

    pub fn from_json_slice(raw: &[u8]) -> Result<Self, ServiceError> {
        let doc: ModelDocument = serde_json::from_slice(raw)
            .map_err(|e| ServiceError::Artifact(format!("unreadable model json: {e}")))?;
        let learner = doc.learner;

        for (param, value) in [
            ("num_class", &learner.learner_model_param.num_class),
            ("num_target", &learner.learner_model_param.num_target),
        ] {
            let count = value.as_deref().map(parse_count).transpose()?.unwrap_or(0);
            if count > 1 {
                return Err(ServiceError::Artifact(format!(
                    "{param}={count}: only single-output models are supported"
                )));
            }
        }

        let (tree_docs, tree_weights) = match learner.gradient_booster {
            BoosterDocument::Gbtree { model } => {
                let weights = vec![1.0; model.trees.len()];
                (model.trees, weights)
            }
            BoosterDocument::Dart {
                gbtree,
                weight_drop,
            } => {
                if weight_drop.len() != gbtree.model.trees.len() {
                    return Err(ServiceError::Artifact(format!(
                        "dart booster has {} trees but {} weights",
                        gbtree.model.trees.len(),
                        weight_drop.len()
                    )));
                }
                (gbtree.model.trees, weight_drop)
            }
            BoosterDocument::Unsupported => {
                return Err(ServiceError::Artifact(
                    "only gbtree and dart boosters are supported".into(),
                ));
            }
        };

        let trees = tree_docs
            .into_iter()
            .enumerate()
            .map(|(idx, doc)| Tree::from_document(idx, doc))
            .collect::<Result<Vec<_>, _>>()?;

        let link = Link::for_objective(&learner.objective.name)?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let base_margin = link.to_margin(base_score);
        if !base_margin.is_finite() {
            return Err(ServiceError::Artifact(format!(
                "base_score {base_score} is outside the domain of {}",
                learner.objective.name
            )));
        }

        let used = trees
            .iter()
            .filter_map(Tree::max_feature)
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        let declared = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .map(parse_count)
            .transpose()?
            .unwrap_or(0);
        let num_features = declared.max(learner.feature_names.len());
        let num_features = if num_features == 0 { used } else { num_features };
        if used > num_features {
            return Err(ServiceError::Artifact(format!(
                "trees split on feature {} but the model declares {num_features} features",
                used - 1
            )));
        }
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_features {
            return Err(ServiceError::Artifact(format!(
                "model lists {} feature names for {num_features} features",
                learner.feature_names.len()
            )));
        }

        Ok(Self {
            trees,
            tree_weights,
            objective: learner.objective.name,
            link,
            base_score,
            base_margin,
            num_features,
            feature_names: learner.feature_names,
        })
    }

    /// Predicts one row whose columns are already in training order.
    pub fn predict_row(&self, row: &[f32]) -> Result<f64, ServiceError> {
        if row.len() != self.num_features {
            return Err(ServiceError::FeatureShape {
                expected: self.num_features,
                actual: row.len(),
            });
        }

        let mut margin = self.base_margin;
        for (tree, weight) in self.trees.iter().zip(&self.tree_weights) {
            margin += tree.leaf_value(row) * weight;
        }

        let output = self.link.apply(margin);
        if !output.is_finite() {
            return Err(ServiceError::Model(format!(
                "prediction is not finite ({output})"
            )));
        }
        Ok(f64::from(output))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    /// Column names recorded in the model file, empty if it was trained
    /// without them.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

fn parse_count(raw: &str) -> Result<usize, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::Artifact(format!("expected a count, got '{raw}'")))
}

/// `base_score` is a plain number in older models and a bracketed vector such
/// as `[5E-1]` in newer ones.
fn parse_base_score(raw: &str) -> Result<f32, ServiceError> {
    let first = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .next()
        .unwrap_or_default()
        .trim();
    first
        .parse()
        .map_err(|_| ServiceError::Artifact(format!("invalid base_score '{raw}'")))
}
