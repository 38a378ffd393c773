use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use tennis_models::{
    EnsemblePrediction, EvaluationMetrics, MatchContext, ModelId, PlayerAttributes, PredictorError,
};
use tennis_services::{EvaluatorService, PlayerDirectory, PlayerProfile, PredictorService};

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictorService>,
    pub evaluator: Arc<EvaluatorService>,
    pub players: Arc<PlayerDirectory>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub models: usize,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelSummary>,
}

#[derive(Serialize)]
pub struct ModelSummary {
    pub id: ModelId,
    pub loaded: bool,
}

/// One participant as sent by clients. Any attribute may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct PlayerPayload {
    pub hand: Option<String>,
    pub height: Option<f64>,
    pub age: Option<f64>,
    pub rank: Option<u32>,
    pub rank_points: Option<u32>,
}

impl From<PlayerPayload> for PlayerAttributes {
    fn from(p: PlayerPayload) -> Self {
        Self {
            hand: p.hand,
            height: p.height,
            age: p.age,
            rank: p.rank,
            rank_points: p.rank_points,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub player1: Option<PlayerPayload>,
    pub player2: Option<PlayerPayload>,
    pub surface: Option<String>,
    pub tourney_level: Option<String>,
    pub round: Option<String>,
}

impl PredictRequest {
    fn into_parts(self) -> Result<(PlayerAttributes, PlayerAttributes, MatchContext), PredictorError> {
        let required = |value: Option<String>, field: &str| value.ok_or_else(|| PredictorError::missing_field(field));
        let context = MatchContext {
            surface: required(self.surface, "surface")?,
            tourney_level: required(self.tourney_level, "tourney_level")?,
            round: required(self.round, "round")?,
        };
        let player1 = self.player1.ok_or_else(|| PredictorError::missing_field("player1"))?;
        let player2 = self.player2.ok_or_else(|| PredictorError::missing_field("player2"))?;
        Ok((player1.into(), player2.into(), context))
    }
}

/// `PredictorError` rendered as `{"error": "..."}` with a matching status code.
pub struct ApiError(PredictorError);

impl From<PredictorError> for ApiError {
    fn from(err: PredictorError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PredictorError::InvalidRequest {
            reason: rejection.body_text(),
        })
    }
}

/// `Json` body whose rejections are reported like every other error.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl ApiError {
    fn status(&self) -> StatusCode {
        let cause = self.0.root_cause();
        if cause.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if matches!(cause, PredictorError::ModelNotFound { .. }) {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/models", get(list_models))
        .route("/predict", post(predict))
        .route("/evaluate/:model_id", get(evaluate))
        .route("/players", get(list_players))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models: state.predictor.model_ids().len(),
    })
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = state.predictor.registry();
    let models = registry
        .list_models()
        .iter()
        .map(|id| ModelSummary {
            id: id.clone(),
            loaded: registry.is_loaded(id),
        })
        .collect();
    Json(ModelsResponse { models })
}

async fn predict(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<PredictRequest>,
) -> Result<Json<EnsemblePrediction>, ApiError> {
    let (player1, player2, context) = request.into_parts()?;
    let prediction = state.predictor.predict(&player1, &player2, &context).await?;
    Ok(Json(prediction))
}

async fn evaluate(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<EvaluationMetrics>, ApiError> {
    let model_id = ModelId::new(model_id);
    info!(model = %model_id, "evaluation requested");

    let evaluator = Arc::clone(&state.evaluator);
    let report = tokio::task::spawn_blocking(move || evaluator.evaluate(&model_id))
        .await
        .map_err(|e| PredictorError::Io(std::io::Error::other(e)))??;
    Ok(Json(report.metrics))
}

async fn list_players(State(state): State<AppState>) -> Result<Json<Vec<PlayerProfile>>, ApiError> {
    let players = Arc::clone(&state.players);
    let profiles = tokio::task::spawn_blocking(move || players.list())
        .await
        .map_err(|e| PredictorError::Io(std::io::Error::other(e)))??;
    Ok(Json(profiles))
}
