use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use tennis_models::{ModelId, DEFAULT_MODEL_IDS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub data: DataConfig,
    pub models: ModelsConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub helpers_dir: PathBuf,
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub dataset_path: PathBuf,
    /// ATP player bios (`atp_players.csv`).
    pub players_path: PathBuf,
    /// Current ATP rankings (`atp_rankings_current.csv`).
    pub rankings_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Where to write evaluation reports as JSON. Reports are only logged when unset.
    pub persist_report: Option<PathBuf>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::defaults()?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. TENNIS__SERVER__PORT=9000, TENNIS__MODELS__ENABLED=svm,knn
            .add_source(
                Environment::with_prefix("TENNIS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("models.enabled")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let enabled: Vec<String> = DEFAULT_MODEL_IDS.iter().map(ToString::to_string).collect();
        Config::builder()
            .set_default("artifacts.helpers_dir", "artifacts/helpers")?
            .set_default("artifacts.models_dir", "artifacts/models")?
            .set_default("data.dataset_path", "data/final.csv")?
            .set_default("data.players_path", "data/raw/atp_players.csv")?
            .set_default("data.rankings_path", "data/raw/atp_rankings_current.csv")?
            .set_default("models.enabled", enabled)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.enabled.iter().map(ModelId::new).collect()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
