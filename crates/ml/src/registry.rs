// Read-only cache of loaded models keyed by identifier

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tennis_models::{ModelId, PredictorError, Result};

use crate::artifacts::read_json;
use crate::models::{ModelArtifact, RegisteredModel};
use crate::schema::FeatureSchema;

/// Loads `<models_dir>/<model_id>.json` at most once per identifier and checks
/// each artifact against the feature schema the helpers were fitted with.
pub struct ModelRegistry {
    models_dir: PathBuf,
    schema: FeatureSchema,
    model_ids: Vec<ModelId>,
    cache: DashMap<ModelId, Arc<RegisteredModel>>,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, schema: FeatureSchema, model_ids: Vec<ModelId>) -> Self {
        Self {
            models_dir: models_dir.into(),
            schema,
            model_ids,
            cache: DashMap::new(),
        }
    }

    /// Registry over models that are already in memory. Nothing is read from disk.
    pub fn from_models(schema: FeatureSchema, models: Vec<RegisteredModel>) -> Result<Self> {
        let registry = Self::new(PathBuf::new(), schema, Vec::new());
        let mut model_ids = Vec::with_capacity(models.len());
        for model in models {
            registry.check_feature_contract(&model)?;
            model_ids.push(model.id().clone());
            registry.cache.insert(model.id().clone(), Arc::new(model));
        }
        Ok(Self { model_ids, ..registry })
    }

    /// Replaces the configured identifiers. Already cached models stay cached.
    #[must_use]
    pub fn with_model_ids(self, model_ids: Vec<ModelId>) -> Self {
        Self { model_ids, ..self }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Configured identifiers, in the order they were registered.
    pub fn list_models(&self) -> &[ModelId] {
        &self.model_ids
    }

    pub fn is_loaded(&self, model_id: &ModelId) -> bool {
        self.cache.contains_key(model_id)
    }

    pub fn load(&self, model_id: &ModelId) -> Result<Arc<RegisteredModel>> {
        let cached = self.cache.get(model_id).map(|m| Arc::clone(m.value()));
        if let Some(model) = cached {
            return Ok(model);
        }

        // the entry lock keeps concurrent callers from reading the same file twice
        match self.cache.entry(model_id.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let model = Arc::new(self.read_model(model_id)?);
                info!(model = %model_id, kind = model.kind(), "loaded model");
                entry.insert(Arc::clone(&model));
                Ok(model)
            }
        }
    }

    /// Loads every configured model, returning the ones that failed.
    pub fn warm_up(&self) -> Vec<(ModelId, PredictorError)> {
        let failures: Vec<_> = self
            .model_ids
            .iter()
            .filter_map(|id| self.load(id).err().map(|e| (id.clone(), e)))
            .collect();
        for (id, error) in &failures {
            warn!(model = %id, %error, "model unavailable after warm-up");
        }
        info!(
            loaded = self.model_ids.len() - failures.len(),
            failed = failures.len(),
            "model registry warmed up"
        );
        failures
    }

    fn read_model(&self, model_id: &ModelId) -> Result<RegisteredModel> {
        if !model_id.is_plain_name() {
            warn!(model = %model_id, "rejected model id that is not a plain file name");
            return Err(PredictorError::ModelNotFound {
                model_id: model_id.to_string(),
            });
        }
        let path = self.models_dir.join(format!("{model_id}.json"));
        if !path.is_file() {
            return Err(PredictorError::ModelNotFound {
                model_id: model_id.to_string(),
            });
        }
        debug!(model = %model_id, path = %path.display(), "reading model artifact");
        let artifact: ModelArtifact = read_json(&path)?;
        let model = RegisteredModel::new(model_id.clone(), artifact)?;
        self.check_feature_contract(&model)?;
        Ok(model)
    }

    fn check_feature_contract(&self, model: &RegisteredModel) -> Result<()> {
        if model.n_features() != self.schema.width() {
            return Err(PredictorError::schema_mismatch(
                format!("feature count of model {}", model.id()),
                self.schema.width(),
                model.n_features(),
            ));
        }
        if let Some(names) = model.feature_names() {
            let expected = self.schema.names();
            if names.iter().map(String::as_str).ne(expected.iter().copied()) {
                return Err(PredictorError::schema_mismatch(
                    format!("feature order of model {}", model.id()),
                    expected.join(","),
                    names.join(","),
                ));
            }
        }
        Ok(())
    }
}
