// src/classifier/mod.rs
//! Gesture classification over complete sample windows

mod decision_tree;
mod model;

pub use decision_tree::{DecisionTreeModel, ModelError, TreeNode};
pub use model::{GestureClassifier, GestureLabel, GestureModel};
