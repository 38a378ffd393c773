// Binary classification metrics over hard-label predictions

use ndarray::ArrayView1;

use tennis_models::{
    ClassMetrics, ClassificationReport, ConfusionMatrix, EvaluationMetrics, PredictorError, Result,
};

use crate::features::CanonicalFeatureMatrix;
use crate::models::RegisteredModel;

/// Everything computed from one pass of a model over a labeled matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub metrics: EvaluationMetrics,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
}

pub fn confusion_matrix(actual: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Result<ConfusionMatrix> {
    if actual.len() != predicted.len() {
        return Err(PredictorError::schema_mismatch(
            "prediction count",
            actual.len(),
            predicted.len(),
        ));
    }
    let mut matrix = ConfusionMatrix::default();
    for (a, p) in actual.iter().zip(predicted.iter()) {
        matrix.record(*a, *p);
    }
    Ok(matrix)
}

#[allow(clippy::cast_precision_loss)]
pub fn classification_report(matrix: &ConfusionMatrix) -> ClassificationReport {
    let positive = ClassMetrics::from_counts(
        matrix.true_positive,
        matrix.false_positive,
        matrix.false_negative,
    );
    // the negative class sees the matrix mirrored
    let negative = ClassMetrics::from_counts(
        matrix.true_negative,
        matrix.false_negative,
        matrix.false_positive,
    );
    let total = negative.support + positive.support;
    let average = |weight_neg: f64, weight_pos: f64| ClassMetrics {
        precision: weight_neg * negative.precision + weight_pos * positive.precision,
        recall: weight_neg * negative.recall + weight_pos * positive.recall,
        f1_score: weight_neg * negative.f1_score + weight_pos * positive.f1_score,
        support: total,
    };
    let weighted_avg = if total == 0 {
        average(0.0, 0.0)
    } else {
        average(
            negative.support as f64 / total as f64,
            positive.support as f64 / total as f64,
        )
    };

    ClassificationReport {
        negative,
        positive,
        accuracy: matrix.accuracy(),
        macro_avg: average(0.5, 0.5),
        weighted_avg,
    }
}

/// Scores `model` on `features` against the true `labels`.
pub fn score(
    model: &RegisteredModel,
    features: &CanonicalFeatureMatrix,
    labels: ArrayView1<u8>,
) -> Result<Scorecard> {
    if labels.len() != features.rows() {
        return Err(PredictorError::schema_mismatch("label count", features.rows(), labels.len()));
    }
    let predicted = model.predict(features.view())?;
    let confusion_matrix = confusion_matrix(labels, predicted.view())?;
    Ok(Scorecard {
        metrics: EvaluationMetrics::from(&confusion_matrix),
        classification_report: classification_report(&confusion_matrix),
        confusion_matrix,
    })
}
