// src/classifier/decision_tree.rs
//! Decision-tree gesture model exported from the offline trainer
//!
//! The tree is stored as a flat node array in JSON:
//!
//! ```json
//! {
//!   "labels": [{"group": 1, "movement": "Extension"}, {"group": 1, "movement": "Flexion"}],
//!   "nodes": [
//!     {"split": {"feature": 0, "threshold": 1.5, "left": 1, "right": 2}},
//!     {"leaf": {"label": 0}},
//!     {"leaf": {"label": 1}}
//!   ]
//! }
//! ```
//!
//! Node 0 is the root and `x[feature] <= threshold` goes left. Every child
//! index must exceed its parent's, so traversal always terminates.

use super::model::{GestureLabel, GestureModel};
use crate::hal::types::{ChannelVector, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Model loading errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model file could not be read
    #[error("Failed to read model file {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON or wrong shape
    #[error("Failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    /// No labels or no nodes
    #[error("Model has no {0}")]
    Empty(&'static str),

    /// Split on a channel the armband does not have
    #[error("Node {node}: feature index {feature} out of range")]
    FeatureOutOfRange {
        /// Offending node index
        node: usize,
        /// Channel index it splits on
        feature: usize,
    },

    /// NaN or infinite split threshold
    #[error("Node {node}: threshold is not finite")]
    NonFiniteThreshold {
        /// Offending node index
        node: usize,
    },

    /// Child index that would loop back or run past the node list
    #[error("Node {node}: child {child} must be greater than the parent and below {len}")]
    InvalidChild {
        /// Offending node index
        node: usize,
        /// Child it points to
        child: usize,
        /// Number of nodes
        len: usize,
    },

    /// Leaf naming a label the model does not define
    #[error("Node {node}: label index {label} out of range ({count} labels)")]
    LabelOutOfRange {
        /// Offending node index
        node: usize,
        /// Label index on the leaf
        label: usize,
        /// Number of labels
        count: usize,
    },
}

/// One entry of the flat node array; the root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `features[feature] <= threshold`, else `right`
    Split {
        /// Channel whose mean is compared
        feature: usize,
        /// Split point in raw EMG units
        threshold: f32,
        /// Index of the `<=` child
        left: usize,
        /// Index of the `>` child
        right: usize,
    },
    /// Terminal prediction
    Leaf {
        /// Index into the model's label list
        label: usize,
    },
}

/// Validated decision tree over per-channel means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTree")]
pub struct DecisionTreeModel {
    labels: Vec<GestureLabel>,
    nodes: Vec<TreeNode>,
}

#[derive(Deserialize)]
struct RawTree {
    labels: Vec<GestureLabel>,
    nodes: Vec<TreeNode>,
}

impl TryFrom<RawTree> for DecisionTreeModel {
    type Error = ModelError;

    fn try_from(raw: RawTree) -> Result<Self, Self::Error> {
        Self::new(raw.labels, raw.nodes)
    }
}

impl DecisionTreeModel {
    /// Build a model, rejecting any node that could index out of bounds or loop
    pub fn new(labels: Vec<GestureLabel>, nodes: Vec<TreeNode>) -> Result<Self, ModelError> {
        if labels.is_empty() {
            return Err(ModelError::Empty("labels"));
        }
        if nodes.is_empty() {
            return Err(ModelError::Empty("nodes"));
        }

        let len = nodes.len();
        for (node, entry) in nodes.iter().enumerate() {
            match *entry {
                TreeNode::Split { feature, threshold, left, right } => {
                    if feature >= CHANNEL_COUNT {
                        return Err(ModelError::FeatureOutOfRange { node, feature });
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::NonFiniteThreshold { node });
                    }
                    for child in [left, right] {
                        if child <= node || child >= len {
                            return Err(ModelError::InvalidChild { node, child, len });
                        }
                    }
                }
                TreeNode::Leaf { label } => {
                    if label >= labels.len() {
                        return Err(ModelError::LabelOutOfRange { node, label, count: labels.len() });
                    }
                }
            }
        }

        Ok(Self { labels, nodes })
    }

    /// Parse and validate `{"labels": [...], "nodes": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let raw: RawTree = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Read and validate a model exported by the trainer
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model = Self::from_json_str(&json)?;
        debug!(path = %path.display(), nodes = model.node_count(), labels = model.labels.len(),
               "Loaded decision tree model");
        Ok(model)
    }

    /// Pretty-printed JSON in the same layout `from_json_str` reads
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Labels referenced by the leaves
    pub fn labels(&self) -> &[GestureLabel] {
        &self.labels
    }

    /// Number of split and leaf nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, in splits
    pub fn depth(&self) -> usize {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = *node {
                depth[left] = depth[left].max(depth[index] + 1);
                depth[right] = depth[right].max(depth[index] + 1);
                deepest = deepest.max(depth[index] + 1);
            }
        }
        deepest
    }

    fn leaf_for(&self, features: &ChannelVector) -> usize {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { label } => return label,
                TreeNode::Split { feature, threshold, left, right } => {
                    // NaN features fall to the right
                    index = if features[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

impl GestureModel for DecisionTreeModel {
    fn predict(&self, features: &ChannelVector) -> GestureLabel {
        self.labels[self.leaf_for(features)].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
        "labels": [
            {"group": 1, "movement": "Extension"},
            {"group": 1, "movement": "Flexion"},
            {"group": 2, "movement": "Flexion"}
        ],
        "nodes": [
            {"split": {"feature": 0, "threshold": 1.5, "left": 1, "right": 2}},
            {"leaf": {"label": 0}},
            {"split": {"feature": 5, "threshold": 20.0, "left": 3, "right": 4}},
            {"leaf": {"label": 1}},
            {"leaf": {"label": 2}}
        ]
    }"#;

    #[test]
    fn test_traversal() {
        let model = DecisionTreeModel::from_json_str(TREE).unwrap();
        assert_eq!(model.depth(), 2);

        let mut x = [0.0f32; 8];
        assert_eq!(model.predict(&x), GestureLabel::new(1, "Extension"));

        x[0] = 1.5;
        assert_eq!(model.predict(&x), GestureLabel::new(1, "Extension"));

        x[0] = 4.0;
        assert_eq!(model.predict(&x), GestureLabel::new(1, "Flexion"));

        x[5] = 30.0;
        assert_eq!(model.predict(&x), GestureLabel::new(2, "Flexion"));
    }

    #[test]
    fn test_json_roundtrip_through_serde() {
        let model = DecisionTreeModel::from_json_str(TREE).unwrap();
        let reloaded = DecisionTreeModel::from_json_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(model, reloaded);
    }

    #[test]
    fn test_rejects_cycles_and_bad_indices() {
        let back_edge = r#"{"labels": [{"group": 1, "movement": "A"}],
            "nodes": [{"split": {"feature": 0, "threshold": 0.0, "left": 0, "right": 1}},
                      {"leaf": {"label": 0}}]}"#;
        assert!(matches!(
            DecisionTreeModel::from_json_str(back_edge),
            Err(ModelError::InvalidChild { node: 0, child: 0, .. })
        ));

        let bad_feature = r#"{"labels": [{"group": 1, "movement": "A"}],
            "nodes": [{"split": {"feature": 8, "threshold": 0.0, "left": 1, "right": 1}},
                      {"leaf": {"label": 0}}]}"#;
        assert!(matches!(
            DecisionTreeModel::from_json_str(bad_feature),
            Err(ModelError::FeatureOutOfRange { feature: 8, .. })
        ));

        let bad_label = r#"{"labels": [{"group": 1, "movement": "A"}],
            "nodes": [{"leaf": {"label": 3}}]}"#;
        assert!(matches!(
            DecisionTreeModel::from_json_str(bad_label),
            Err(ModelError::LabelOutOfRange { label: 3, .. })
        ));

        let empty = r#"{"labels": [], "nodes": []}"#;
        assert!(matches!(DecisionTreeModel::from_json_str(empty), Err(ModelError::Empty(_))));
    }

    #[test]
    fn test_missing_file_and_garbage() {
        assert!(matches!(
            DecisionTreeModel::from_json_file("/nonexistent/model.json"),
            Err(ModelError::Io { .. })
        ));
        assert!(matches!(DecisionTreeModel::from_json_str("not json"), Err(ModelError::Parse(_))));
    }
}
