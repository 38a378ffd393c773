// Prediction service: one feature matrix, fanned out to every registered model

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tennis_ml::{CanonicalFeatureMatrix, FeatureAssembler, ModelRegistry};
use tennis_models::{
    BatchPrediction, EnsemblePrediction, MatchContext, MatchRecord, ModelId, ModelOutcome, PlayerAttributes,
    PredictorError, Result,
};

type ModelTask = JoinHandle<Result<Vec<f64>>>;

pub struct PredictorService {
    assembler: FeatureAssembler,
    registry: Arc<ModelRegistry>,
}

impl PredictorService {
    pub fn new(assembler: FeatureAssembler, registry: Arc<ModelRegistry>) -> Self {
        Self { assembler, registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn model_ids(&self) -> &[ModelId] {
        self.registry.list_models()
    }

    /// Probability that `player` beats `opponent`, from every configured model.
    ///
    /// Encoding problems fail the whole request. A model that cannot be loaded
    /// or fails to score shows up as a `Failed` entry without affecting the others.
    pub async fn predict(
        &self,
        player: &PlayerAttributes,
        opponent: &PlayerAttributes,
        context: &MatchContext,
    ) -> Result<EnsemblePrediction> {
        let record = MatchRecord::from_context(player.clone(), opponent.clone(), context);
        let batch = self.predict_records(std::slice::from_ref(&record)).await?;

        let outcomes = batch
            .outcomes
            .into_iter()
            .map(|(id, outcome)| {
                let outcome = match outcome {
                    Ok(probabilities) => match probabilities.first() {
                        Some(p) => ModelOutcome::Probability(*p),
                        None => ModelOutcome::Failed {
                            error: "model returned no probability".to_string(),
                        },
                    },
                    Err(error) => ModelOutcome::Failed { error },
                };
                (id, outcome)
            })
            .collect();
        let prediction = EnsemblePrediction { outcomes };

        info!(
            surface = %context.surface,
            models = prediction.len(),
            favouring_player = prediction.favouring_player(),
            "ensemble prediction complete"
        );
        Ok(prediction)
    }

    /// Scores many records at once; `outcomes[id][i]` belongs to `records[i]`.
    pub async fn predict_records(&self, records: &[MatchRecord]) -> Result<BatchPrediction> {
        let features = Arc::new(self.assembler.assemble(records)?);
        let rows = features.rows();

        let tasks: Vec<(ModelId, ModelTask)> = self
            .registry
            .list_models()
            .iter()
            .map(|id| (id.clone(), self.spawn_model(id.clone(), Arc::clone(&features))))
            .collect();

        Ok(BatchPrediction {
            rows,
            outcomes: collect_outcomes(tasks).await,
        })
    }

    fn spawn_model(&self, model_id: ModelId, features: Arc<CanonicalFeatureMatrix>) -> ModelTask {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || {
            let model = registry.load(&model_id)?;
            let probabilities = model.predict_proba(features.view())?;
            debug!(model = %model_id, rows = probabilities.len(), "model scored");
            if probabilities.len() != features.rows() {
                return Err(PredictorError::schema_mismatch(
                    format!("output rows of model {model_id}"),
                    features.rows(),
                    probabilities.len(),
                ));
            }
            Ok(probabilities.to_vec())
        })
    }
}

/// Awaits every model task. Errors and panics stay with the model that raised them.
async fn collect_outcomes(
    tasks: Vec<(ModelId, ModelTask)>,
) -> BTreeMap<ModelId, std::result::Result<Vec<f64>, String>> {
    let mut outcomes = BTreeMap::new();
    for (id, task) in tasks {
        let outcome = match task.await {
            Ok(Ok(probabilities)) => Ok(probabilities),
            Ok(Err(error)) => {
                warn!(model = %id, %error, "model failed to score");
                Err(error.to_string())
            }
            Err(join_error) => {
                warn!(model = %id, error = %join_error, "model task aborted");
                Err(format!("model task aborted: {join_error}"))
            }
        };
        outcomes.insert(id, outcome);
    }
    outcomes
}
