use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("Unknown category for {field}: {label:?} is not in the fitted vocabulary")]
    UnknownCategory { field: String, label: String },

    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    #[error("Schema mismatch in {context}: expected {expected}, found {found}")]
    SchemaMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("Evaluation of {model_id} on {dataset} failed: {source}")]
    EvaluationFailed {
        model_id: String,
        dataset: String,
        #[source]
        source: Box<PredictorError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dataset error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl PredictorError {
    pub fn unknown_category(field: &str, label: &str) -> Self {
        Self::UnknownCategory {
            field: field.to_string(),
            label: label.to_string(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
        }
    }

    pub fn schema_mismatch(context: impl Into<String>, expected: impl ToString, found: impl ToString) -> Self {
        Self::SchemaMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the fitted artifacts.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory { .. } | Self::MissingRequiredField { .. } | Self::InvalidRequest { .. }
        )
    }

    /// The innermost error, looking through evaluation context.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::EvaluationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
