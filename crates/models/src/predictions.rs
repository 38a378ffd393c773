use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::records::ModelId;

/// Result of asking a single model for a probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    /// Probability that the first-named participant wins.
    Probability(f64),
    Failed { error: String },
}

impl ModelOutcome {
    pub fn probability(&self) -> Option<f64> {
        match self {
            Self::Probability(p) => Some(*p),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-model answers for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnsemblePrediction {
    pub outcomes: BTreeMap<ModelId, ModelOutcome>,
}

impl EnsemblePrediction {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelOutcome> {
        self.outcomes.get(&ModelId::from(model_id))
    }

    /// Successful probabilities only, in model id order.
    pub fn probabilities(&self) -> impl Iterator<Item = (&ModelId, f64)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.probability().map(|p| (id, p)))
    }

    /// Number of models favouring the first-named participant.
    pub fn favouring_player(&self) -> usize {
        self.probabilities().filter(|(_, p)| *p > 0.5).count()
    }
}

/// Per-model answers for many matches, one probability per input record.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub rows: usize,
    pub outcomes: BTreeMap<ModelId, std::result::Result<Vec<f64>, String>>,
}

/// Binary confusion matrix with "first-named participant wins" as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn record(&mut self, actual: u8, predicted: u8) {
        match (actual, predicted) {
            (1, 1) => self.true_positive += 1,
            (1, _) => self.false_negative += 1,
            (_, 1) => self.false_positive += 1,
            _ => self.true_negative += 1,
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// Precision of the positive class; 0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1_score(&self) -> f64 {
        harmonic_mean(self.precision(), self.recall())
    }

    /// Rows in `[[tn, fp], [fn, tp]]` layout.
    pub fn as_rows(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .as_rows()
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);
        let [[tn, fp], [fn_, tp]] = self.as_rows();
        writeln!(f, "[[{tn:>width$} {fp:>width$}]")?;
        write!(f, " [{fn_:>width$} {tp:>width$}]]")
    }
}

/// Precision/recall/F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: u64,
}

impl ClassMetrics {
    pub fn from_counts(true_positive: u64, false_positive: u64, false_negative: u64) -> Self {
        let precision = ratio(true_positive, true_positive + false_positive);
        let recall = ratio(true_positive, true_positive + false_negative);
        Self {
            precision,
            recall,
            f1_score: harmonic_mean(precision, recall),
            support: true_positive + false_negative,
        }
    }
}

/// Per-class breakdown plus macro and weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.negative.support + self.positive.support;
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (name, m) in [("0", &self.negative), ("1", &self.positive)] {
            writeln!(
                f,
                "{name:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14} {:>9} {:>9} {:>9.2} {total:>9}", "accuracy", "", "", self.accuracy)?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{name:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        Ok(())
    }
}

/// The metrics exposed to callers of `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1_score")]
    pub f1: f64,
}

impl From<&ConfusionMatrix> for EvaluationMetrics {
    fn from(matrix: &ConfusionMatrix) -> Self {
        Self {
            accuracy: matrix.accuracy(),
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: matrix.f1_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_id: ModelId,
    pub dataset: String,
    pub metrics: EvaluationMetrics,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
    pub evaluated_at: DateTime<Utc>,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}
