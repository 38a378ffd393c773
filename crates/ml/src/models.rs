// Fitted binary classifiers

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use tennis_models::{ModelId, PredictorError, Result};

use crate::trees::{DecisionTree, SplitRule};

/// A fitted binary classifier over canonical feature rows.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Probability of the positive class ("first-named participant wins") per row.
    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64>;

    /// Hard labels in {0, 1}.
    fn predict(&self, features: ArrayView2<f64>) -> Array1<u8> {
        self.predict_proba(features).mapv(|p| u8::from(p > 0.5))
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String>;
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn check_width(what: &str, len: usize, n_features: usize) -> std::result::Result<(), String> {
    if len == n_features {
        Ok(())
    } else {
        Err(format!("{what} has {len} values, expected {n_features}"))
    }
}

fn dot(weights: &[f64], row: ArrayView1<f64>) -> f64 {
    weights.iter().zip(row.iter()).map(|(w, x)| w * x).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        features
            .axis_iter(Axis(0))
            .map(|row| sigmoid(dot(&self.coefficients, row) + self.intercept))
            .collect()
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        check_width("coefficients", self.coefficients.len(), n_features)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: i32 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    fn apply(self, a: &[f64], b: ArrayView1<f64>) -> f64 {
        match self {
            Self::Linear => dot(a, b),
            Self::Rbf { gamma } => {
                let squared: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * squared).exp()
            }
            Self::Poly { gamma, coef0, degree } => (gamma * dot(a, b) + coef0).powi(degree),
            Self::Sigmoid { gamma, coef0 } => (gamma * dot(a, b) + coef0).tanh(),
        }
    }
}

/// Kernel SVM with Platt-scaled probabilities:
/// `p = 1 / (1 + exp(probability_a * f + probability_b))` for decision value `f`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coefficients: Vec<f64>,
    pub intercept: f64,
    pub probability_a: f64,
    pub probability_b: f64,
}

impl SupportVectorClassifier {
    pub fn decision_function(&self, features: ArrayView2<f64>) -> Array1<f64> {
        features
            .axis_iter(Axis(0))
            .map(|row| {
                self.support_vectors
                    .iter()
                    .zip(&self.dual_coefficients)
                    .map(|(sv, alpha)| alpha * self.kernel.apply(sv, row))
                    .sum::<f64>()
                    + self.intercept
            })
            .collect()
    }
}

impl Classifier for SupportVectorClassifier {
    fn kind(&self) -> &'static str {
        "svm"
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        self.decision_function(features)
            .mapv(|f| 1.0 / (1.0 + (self.probability_a * f + self.probability_b).exp()))
    }

    /// Labels follow the sign of the decision function, not the calibrated probability.
    fn predict(&self, features: ArrayView2<f64>) -> Array1<u8> {
        self.decision_function(features).mapv(|f| u8::from(f > 0.0))
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.support_vectors.is_empty() {
            return Err("no support vectors".to_string());
        }
        check_width("dual_coefficients", self.dual_coefficients.len(), self.support_vectors.len())?;
        self.support_vectors
            .iter()
            .try_for_each(|sv| check_width("support vector", sv.len(), n_features))
    }
}

/// Averages the positive-class probability stored in each tree's leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        let n_trees = self.trees.len() as f64;
        features
            .axis_iter(Axis(0))
            .map(|row| {
                self.trees
                    .iter()
                    .map(|tree| tree.evaluate(row, SplitRule::LessOrEqual))
                    .sum::<f64>()
                    / n_trees
            })
            .collect()
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| format!("tree {i}: {e}"))?;
            let leaves_are_probabilities = tree.nodes.iter().all(|node| match node {
                crate::trees::TreeNode::Leaf { value } => (0.0..=1.0).contains(value),
                crate::trees::TreeNode::Split { .. } => true,
            });
            if !leaves_are_probabilities {
                return Err(format!("tree {i}: leaf values must be probabilities"));
            }
        }
        Ok(())
    }
}

/// Additive log-odds model: `sigmoid(init + learning_rate * sum(tree(x)))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub init_log_odds: f64,
    pub learning_rate: f64,
    pub trees: Vec<DecisionTree>,
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> &'static str {
        "gradient_boosting"
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        features
            .axis_iter(Axis(0))
            .map(|row| {
                let boost: f64 = self
                    .trees
                    .iter()
                    .map(|tree| tree.evaluate(row, SplitRule::LessOrEqual))
                    .sum();
                sigmoid(self.init_log_odds + self.learning_rate * boost)
            })
            .collect()
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if !(self.learning_rate.is_finite() && self.init_log_odds.is_finite()) {
            return Err("learning_rate and init_log_odds must be finite".to_string());
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| tree.validate(n_features).map_err(|e| format!("tree {i}: {e}")))
    }
}

/// XGBoost-style booster: leaves already include the learning rate, splits use `x < threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    /// Prior probability of the positive class.
    pub base_score: f64,
    pub trees: Vec<DecisionTree>,
}

impl Classifier for BoostedTrees {
    fn kind(&self) -> &'static str {
        "xgboost"
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        let base_margin = (self.base_score / (1.0 - self.base_score)).ln();
        features
            .axis_iter(Axis(0))
            .map(|row| {
                let margin: f64 = self
                    .trees
                    .iter()
                    .map(|tree| tree.evaluate(row, SplitRule::LessThan))
                    .sum();
                sigmoid(base_margin + margin)
            })
            .collect()
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if !(self.base_score > 0.0 && self.base_score < 1.0) {
            return Err(format!("base_score {} must lie in (0, 1)", self.base_score));
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| tree.validate(n_features).map_err(|e| format!("tree {i}: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    Uniform,
    Distance,
}

/// k-nearest-neighbours vote over stored training rows using a Minkowski metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    pub k: usize,
    pub weights: NeighborWeights,
    /// Minkowski power: 1 = manhattan, 2 = euclidean.
    pub p: f64,
    pub points: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl NearestNeighbors {
    fn distance(&self, a: &[f64], b: ArrayView1<f64>) -> f64 {
        let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs().powf(self.p)).sum();
        sum.powf(1.0 / self.p)
    }

    fn vote(&self, row: ArrayView1<f64>) -> f64 {
        let mut neighbours: Vec<(f64, u8)> = self
            .points
            .iter()
            .zip(&self.labels)
            .map(|(point, label)| (self.distance(point, row), *label))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(self.k);

        let weighted: Vec<(f64, u8)> = match self.weights {
            NeighborWeights::Uniform => neighbours.iter().map(|(_, l)| (1.0, *l)).collect(),
            NeighborWeights::Distance => {
                // exact matches take all of the weight
                if neighbours.iter().any(|(d, _)| *d == 0.0) {
                    neighbours
                        .iter()
                        .filter(|(d, _)| *d == 0.0)
                        .map(|(_, l)| (1.0, *l))
                        .collect()
                } else {
                    neighbours.iter().map(|(d, l)| (1.0 / d, *l)).collect()
                }
            }
        };
        let total: f64 = weighted.iter().map(|(w, _)| w).sum();
        let positive: f64 = weighted.iter().filter(|(_, l)| *l == 1).map(|(w, _)| w).sum();
        positive / total
    }
}

impl Classifier for NearestNeighbors {
    fn kind(&self) -> &'static str {
        "knn"
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        features.axis_iter(Axis(0)).map(|row| self.vote(row)).collect()
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.k == 0 || self.k > self.points.len() {
            return Err(format!("k = {} with {} stored points", self.k, self.points.len()));
        }
        if self.p < 1.0 || !self.p.is_finite() {
            return Err(format!("minkowski power {} must be >= 1", self.p));
        }
        check_width("labels", self.labels.len(), self.points.len())?;
        if self.labels.iter().any(|l| *l > 1) {
            return Err("labels must be 0 or 1".to_string());
        }
        self.points
            .iter()
            .try_for_each(|point| check_width("point", point.len(), n_features))
    }
}

/// Every classifier family the training stage can persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedClassifier {
    LogisticRegression(LogisticRegression),
    Svm(SupportVectorClassifier),
    RandomForest(RandomForest),
    Knn(NearestNeighbors),
    GradientBoosting(GradientBoosting),
    Xgboost(BoostedTrees),
}

impl FittedClassifier {
    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            Self::LogisticRegression(m) => m,
            Self::Svm(m) => m,
            Self::RandomForest(m) => m,
            Self::Knn(m) => m,
            Self::GradientBoosting(m) => m,
            Self::Xgboost(m) => m,
        }
    }
}

/// On-disk form of one trained model. `n_features` and `feature_names`
/// declare the column layout the model was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub n_features: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub model: FittedClassifier,
}

/// A loaded, validated model bound to its identifier. Never mutated after load.
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    id: ModelId,
    artifact: ModelArtifact,
}

impl RegisteredModel {
    pub fn new(id: ModelId, artifact: ModelArtifact) -> Result<Self> {
        artifact
            .model
            .as_classifier()
            .validate(artifact.n_features)
            .map_err(|reason| PredictorError::InvalidArtifact {
                path: id.to_string(),
                reason,
            })?;
        if let Some(names) = &artifact.feature_names {
            if names.len() != artifact.n_features {
                return Err(PredictorError::InvalidArtifact {
                    path: id.to_string(),
                    reason: format!("{} feature names for {} features", names.len(), artifact.n_features),
                });
            }
        }
        Ok(Self { id, artifact })
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn kind(&self) -> &'static str {
        self.artifact.model.as_classifier().kind()
    }

    pub fn n_features(&self) -> usize {
        self.artifact.n_features
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.artifact.feature_names.as_deref()
    }

    pub fn predict_proba(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_input(features)?;
        let probabilities = self.artifact.model.as_classifier().predict_proba(features);
        if let Some(row) = probabilities.iter().position(|p| !(0.0..=1.0).contains(p)) {
            return Err(PredictorError::InvalidArtifact {
                path: self.id.to_string(),
                reason: format!("probability {} for row {row} is outside [0, 1]", probabilities[row]),
            });
        }
        Ok(probabilities)
    }

    pub fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>> {
        self.check_input(features)?;
        Ok(self.artifact.model.as_classifier().predict(features))
    }

    fn check_input(&self, features: ArrayView2<f64>) -> Result<()> {
        if features.ncols() == self.n_features() {
            Ok(())
        } else {
            Err(PredictorError::schema_mismatch(
                format!("input of model {}", self.id),
                self.n_features(),
                features.ncols(),
            ))
        }
    }
}
