// Flattened decision trees shared by the forest and boosting classifiers

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Which side of a threshold a value equal to it goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// `x <= threshold` goes left.
    LessOrEqual,
    /// `x < threshold` goes left.
    LessThan,
}

impl SplitRule {
    fn goes_left(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::LessOrEqual => value <= threshold,
            Self::LessThan => value < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Nodes stored root-first; children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {index} splits on feature {feature} of {n_features}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {index} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(format!("node {index} points to invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {index} holds a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `row`. Assumes a validated tree.
    pub fn evaluate(&self, row: ArrayView1<f64>, rule: SplitRule) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if rule.goes_left(row[*feature], *threshold) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}
