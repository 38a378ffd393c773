use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PredictorError, Result};

/// Identifier of a registered classifier, e.g. `random_forest`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id can name a file inside the models directory:
    /// ASCII letters, digits, `_` and `-` only.
    pub fn is_plain_name(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Model identifiers produced by the training stage.
pub const DEFAULT_MODEL_IDS: [&str; 6] = [
    "logistic_regression",
    "svm",
    "random_forest",
    "knn",
    "gradient_boosting",
    "xgboost",
];

/// Per-participant attributes. Every field is nullable in the historical data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttributes {
    pub hand: Option<String>,
    /// Height in centimetres.
    pub height: Option<f64>,
    /// Age in years.
    pub age: Option<f64>,
    /// `None` for unranked players.
    pub rank: Option<u32>,
    pub rank_points: Option<u32>,
}

impl PlayerAttributes {
    pub fn new(hand: &str, height: f64, age: f64, rank: u32, rank_points: u32) -> Self {
        Self {
            hand: Some(hand.to_string()),
            height: Some(height),
            age: Some(age),
            rank: Some(rank),
            rank_points: Some(rank_points),
        }
    }
}

/// Match context supplied with a prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub surface: String,
    pub tourney_level: String,
    pub round: String,
}

impl MatchContext {
    pub fn new(surface: &str, tourney_level: &str, round: &str) -> Self {
        Self {
            surface: surface.to_string(),
            tourney_level: tourney_level.to_string(),
            round: round.to_string(),
        }
    }
}

/// One observation of a match seen from the first-named participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub surface: Option<String>,
    pub player: PlayerAttributes,
    pub opponent: PlayerAttributes,
    pub tourney_level: Option<String>,
    pub round: Option<String>,
    /// 1 when `player` won. Only present in labeled datasets.
    pub result: Option<u8>,
}

impl MatchRecord {
    pub fn from_context(player: PlayerAttributes, opponent: PlayerAttributes, context: &MatchContext) -> Self {
        Self {
            surface: Some(context.surface.clone()),
            player,
            opponent,
            tourney_level: Some(context.tourney_level.clone()),
            round: Some(context.round.clone()),
            result: None,
        }
    }

    pub fn with_result(mut self, result: u8) -> Self {
        self.result = Some(result);
        self
    }

    pub fn label(&self) -> Result<u8> {
        match self.result {
            Some(label @ (0 | 1)) => Ok(label),
            Some(other) => Err(PredictorError::schema_mismatch("result label", "0 or 1", other)),
            None => Err(PredictorError::missing_field("result")),
        }
    }
}
