mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crate::config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tennis_api::{create_routes, AppState};
use tennis_ml::{FeatureAssembler, FittedArtifactBundle, ModelRegistry};
use tennis_models::{MatchContext, ModelId, PlayerAttributes};
use tennis_services::{load_dataset, EvaluatorService, PlayerDirectory, PredictorService};

#[derive(Parser)]
#[command(name = "tennis-predictor", version, about = "Ensemble match outcome predictor for ATP tennis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Win probability of player 1 over player 2 from every enabled model
    Predict {
        #[command(flatten)]
        player1: PlayerArgs,
        #[command(flatten)]
        player2: OpponentArgs,
        surface: String,
        tourney_level: String,
        round: String,
    },
    /// Score one model against the labeled dataset
    Evaluate {
        model_id: String,
        /// Write the full report as JSON to this path
        #[arg(long)]
        persist: Option<PathBuf>,
    },
    /// List enabled models and whether their artifacts load
    Models,
    /// Players from the labeled dataset with their current ranking, as JSON
    Players,
    /// Fit the encoders and imputer from the labeled dataset and save them
    FitHelpers {
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Run the HTTP API (default)
    Serve,
}

#[derive(clap::Args)]
struct PlayerArgs {
    player1_hand: String,
    player1_height: f64,
    player1_age: f64,
    player1_rank: u32,
    player1_points: u32,
}

#[derive(clap::Args)]
struct OpponentArgs {
    player2_hand: String,
    player2_height: f64,
    player2_age: f64,
    player2_rank: u32,
    player2_points: u32,
}

impl From<&PlayerArgs> for PlayerAttributes {
    fn from(a: &PlayerArgs) -> Self {
        Self::new(&a.player1_hand, a.player1_height, a.player1_age, a.player1_rank, a.player1_points)
    }
}

impl From<&OpponentArgs> for PlayerAttributes {
    fn from(a: &OpponentArgs) -> Self {
        Self::new(&a.player2_hand, a.player2_height, a.player2_age, a.player2_rank, a.player2_points)
    }
}

/// Everything the commands share once the helper artifacts are loaded.
struct Engines {
    predictor: Arc<PredictorService>,
    evaluator: Arc<EvaluatorService>,
    players: Arc<PlayerDirectory>,
}

impl Engines {
    fn build(config: &AppConfig, persist: Option<PathBuf>) -> Result<Self> {
        let bundle = FittedArtifactBundle::load(&config.artifacts.helpers_dir).with_context(|| {
            format!(
                "loading helper artifacts from {}",
                config.artifacts.helpers_dir.display()
            )
        })?;
        let assembler = FeatureAssembler::new(Arc::new(bundle));
        info!("✅ Helper artifacts loaded ({} features)", assembler.schema().width());

        let registry = Arc::new(ModelRegistry::new(
            &config.artifacts.models_dir,
            assembler.schema().clone(),
            config.model_ids(),
        ));
        for (model_id, e) in registry.warm_up() {
            warn!("⚠️  {} will report errors: {}", model_id, e);
        }

        let evaluator = EvaluatorService::new(assembler.clone(), Arc::clone(&registry), &config.data.dataset_path)
            .with_persistence(persist.or_else(|| config.evaluation.persist_report.clone()));
        let players = PlayerDirectory::new(
            &config.data.players_path,
            &config.data.rankings_path,
            &config.data.dataset_path,
        );
        Ok(Self {
            predictor: Arc::new(PredictorService::new(assembler, registry)),
            evaluator: Arc::new(evaluator),
            players: Arc::new(players),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tennis_predictor=info,tennis_services=info,tennis_ml=info,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::new().context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Predict {
            player1,
            player2,
            surface,
            tourney_level,
            round,
        } => {
            let engines = Engines::build(&config, None)?;
            let context = MatchContext::new(&surface, &tourney_level, &round);
            let player1 = PlayerAttributes::from(&player1);
            let player2 = PlayerAttributes::from(&player2);
            let prediction = engines.predictor.predict(&player1, &player2, &context).await?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Evaluate { model_id, persist } => {
            let engines = Engines::build(&config, persist)?;
            let model_id = ModelId::new(model_id);
            let evaluator = Arc::clone(&engines.evaluator);
            let report = tokio::task::spawn_blocking(move || evaluator.evaluate(&model_id)).await??;
            println!("{}", serde_json::to_string_pretty(&report.metrics)?);
            println!("Confusion matrix:\n{}", report.confusion_matrix);
            println!("{}", report.classification_report);
        }
        Command::Models => {
            let engines = Engines::build(&config, None)?;
            let registry = engines.predictor.registry();
            for model_id in registry.list_models() {
                let status = if registry.is_loaded(model_id) { "loaded" } else { "unavailable" };
                println!("{model_id}\t{status}");
            }
        }
        Command::Players => {
            let players = PlayerDirectory::new(
                &config.data.players_path,
                &config.data.rankings_path,
                &config.data.dataset_path,
            );
            let profiles = players.list().context("reading player directory")?;
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        Command::FitHelpers { dataset } => {
            let dataset = dataset.unwrap_or_else(|| config.data.dataset_path.clone());
            let records = load_dataset(&dataset).with_context(|| format!("reading {}", dataset.display()))?;
            let bundle = FittedArtifactBundle::fit(&records)?;
            bundle.save(&config.artifacts.helpers_dir)?;
            info!(
                "✅ Fitted helpers on {} rows, saved to {}",
                records.len(),
                config.artifacts.helpers_dir.display()
            );
        }
        Command::Serve => serve(&config).await?,
    }

    Ok(())
}

async fn serve(config: &AppConfig) -> Result<()> {
    info!("🎾 Starting tennis match predictor");
    let engines = Engines::build(config, None)?;

    let state = AppState {
        predictor: engines.predictor,
        evaluator: engines.evaluator,
        players: engines.players,
    };
    let app = create_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("🌐 Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("❌ Failed to listen for shutdown signal: {}", e);
            }
            info!("👋 Shutting down gracefully");
        })
        .await?;
    Ok(())
}
