// Evaluation service: replays a labeled dataset through one model

use chrono::Utc;
use ndarray::Array1;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use tennis_ml::{score, FeatureAssembler, ModelRegistry};
use tennis_models::{EvaluationReport, MatchRecord, ModelId, PredictorError, Result};

use crate::dataset::load_dataset;

pub struct EvaluatorService {
    assembler: FeatureAssembler,
    registry: Arc<ModelRegistry>,
    dataset_path: PathBuf,
    persist_path: Option<PathBuf>,
}

impl EvaluatorService {
    pub fn new(assembler: FeatureAssembler, registry: Arc<ModelRegistry>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            assembler,
            registry,
            dataset_path: dataset_path.into(),
            persist_path: None,
        }
    }

    /// Also write every report as JSON to `path`.
    #[must_use]
    pub fn with_persistence(mut self, path: Option<PathBuf>) -> Self {
        self.persist_path = path;
        self
    }

    /// Evaluates `model_id` against the configured dataset file.
    ///
    /// Blocking: reads the dataset and runs the model on the calling thread.
    pub fn evaluate(&self, model_id: &ModelId) -> Result<EvaluationReport> {
        let dataset = self.dataset_path.display().to_string();
        let records = load_dataset(&self.dataset_path).map_err(|e| wrap(model_id, &dataset, e))?;
        self.evaluate_records(model_id, &records, &dataset)
    }

    /// Evaluates `model_id` against records already in memory.
    pub fn evaluate_records(
        &self,
        model_id: &ModelId,
        records: &[MatchRecord],
        dataset: &str,
    ) -> Result<EvaluationReport> {
        let report = self.run(model_id, records, dataset).map_err(|e| {
            error!(model = %model_id, dataset, error = %e, "evaluation failed");
            wrap(model_id, dataset, e)
        })?;

        info!(
            model = %model_id,
            dataset,
            rows = records.len(),
            accuracy = report.metrics.accuracy,
            precision = report.metrics.precision,
            recall = report.metrics.recall,
            f1_score = report.metrics.f1,
            "evaluation complete"
        );
        info!(model = %model_id, "confusion matrix:\n{}", report.confusion_matrix);
        info!(model = %model_id, "classification report:\n{}", report.classification_report);

        if let Some(path) = &self.persist_path {
            persist(path, &report).map_err(|e| wrap(model_id, dataset, e))?;
            info!(model = %model_id, path = %path.display(), "evaluation report written");
        }
        Ok(report)
    }

    fn run(&self, model_id: &ModelId, records: &[MatchRecord], dataset: &str) -> Result<EvaluationReport> {
        let labels = records
            .iter()
            .map(MatchRecord::label)
            .collect::<Result<Array1<u8>>>()?;
        let features = self.assembler.assemble(records)?;
        let model = self.registry.load(model_id)?;
        let scorecard = score(&model, &features, labels.view())?;

        Ok(EvaluationReport {
            model_id: model_id.clone(),
            dataset: dataset.to_string(),
            metrics: scorecard.metrics,
            confusion_matrix: scorecard.confusion_matrix,
            classification_report: scorecard.classification_report,
            evaluated_at: Utc::now(),
        })
    }
}

fn wrap(model_id: &ModelId, dataset: &str, source: PredictorError) -> PredictorError {
    PredictorError::EvaluationFailed {
        model_id: model_id.to_string(),
        dataset: dataset.to_string(),
        source: Box::new(source),
    }
}

fn persist(path: &Path, report: &EvaluationReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(report)?)?;
    Ok(())
}
