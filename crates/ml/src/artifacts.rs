// Loading, fitting and persisting the helper artifacts the assembler needs

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use tennis_models::{MatchRecord, PredictorError, Result};

use crate::codec::{CategoricalCodec, Imputer, MultiHotCodec};
use crate::features::raw_feature_matrix;
use crate::schema::{BaseField, FeatureSchema, RawValue};

pub const PLAYER_HAND_FILE: &str = "player_hand_encoder.json";
pub const OPPONENT_HAND_FILE: &str = "opponent_hand_encoder.json";
pub const SURFACE_FILE: &str = "surface_binarizer.json";
pub const TOURNEY_LEVEL_FILE: &str = "tourney_level_encoder.json";
pub const ROUND_FILE: &str = "round_encoder.json";
pub const IMPUTER_FILE: &str = "imputer.json";

const SURFACE_FIELD: &str = "surface";

/// Every fitted helper artifact, constructed once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedArtifactBundle {
    player_hand: CategoricalCodec,
    opponent_hand: CategoricalCodec,
    surface: MultiHotCodec,
    tourney_level: CategoricalCodec,
    round: CategoricalCodec,
    imputer: Imputer,
    schema: FeatureSchema,
}

impl FittedArtifactBundle {
    pub fn new(
        player_hand: CategoricalCodec,
        opponent_hand: CategoricalCodec,
        surface: MultiHotCodec,
        tourney_level: CategoricalCodec,
        round: CategoricalCodec,
        imputer: Imputer,
    ) -> Result<Self> {
        let schema = FeatureSchema::new(surface.classes());
        if imputer.width() != schema.width() {
            return Err(PredictorError::schema_mismatch(
                "imputer statistics",
                schema.width(),
                imputer.width(),
            ));
        }
        Ok(Self {
            player_hand,
            opponent_hand,
            surface,
            tourney_level,
            round,
            imputer,
            schema,
        })
    }

    /// Fits every codec and the imputer from a training dataset.
    pub fn fit(records: &[MatchRecord]) -> Result<Self> {
        let labels = |field: BaseField| {
            records
                .iter()
                .filter_map(|r| match field.extract(r) {
                    RawValue::Label(label) => label,
                    RawValue::Number(_) => None,
                })
                .collect::<Vec<_>>()
        };
        let surfaces: Vec<&str> = records.iter().filter_map(|r| r.surface.as_deref()).collect();

        let player_hand = CategoricalCodec::fit(BaseField::PlayerHand.column_name(), labels(BaseField::PlayerHand));
        let opponent_hand =
            CategoricalCodec::fit(BaseField::OpponentHand.column_name(), labels(BaseField::OpponentHand));
        let tourney_level =
            CategoricalCodec::fit(BaseField::TourneyLevel.column_name(), labels(BaseField::TourneyLevel));
        let round = CategoricalCodec::fit(BaseField::Round.column_name(), labels(BaseField::Round));
        let surface = MultiHotCodec::fit(SURFACE_FIELD, surfaces);

        let width = FeatureSchema::new(surface.classes()).width();
        let placeholder = Imputer::new(vec![0.0; width])?;
        let mut bundle = Self::new(player_hand, opponent_hand, surface, tourney_level, round, placeholder)?;

        let raw = raw_feature_matrix(records, &bundle)?;
        bundle.imputer = Imputer::fit(raw.view());
        info!(rows = records.len(), columns = width, "fitted codecs and imputer");
        Ok(bundle)
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let bundle = Self::new(
            read_codec(dir, PLAYER_HAND_FILE, BaseField::PlayerHand.column_name())?,
            read_codec(dir, OPPONENT_HAND_FILE, BaseField::OpponentHand.column_name())?,
            read_codec(dir, SURFACE_FILE, SURFACE_FIELD)?,
            read_codec(dir, TOURNEY_LEVEL_FILE, BaseField::TourneyLevel.column_name())?,
            read_codec(dir, ROUND_FILE, BaseField::Round.column_name())?,
            read_json(&dir.join(IMPUTER_FILE))?,
        )?;
        info!(
            dir = %dir.display(),
            columns = bundle.schema.width(),
            surfaces = ?bundle.surface.classes(),
            "loaded fitted helper artifacts"
        );
        Ok(bundle)
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_json(&dir.join(PLAYER_HAND_FILE), &self.player_hand)?;
        write_json(&dir.join(OPPONENT_HAND_FILE), &self.opponent_hand)?;
        write_json(&dir.join(SURFACE_FILE), &self.surface)?;
        write_json(&dir.join(TOURNEY_LEVEL_FILE), &self.tourney_level)?;
        write_json(&dir.join(ROUND_FILE), &self.round)?;
        write_json(&dir.join(IMPUTER_FILE), &self.imputer)?;
        info!(dir = %dir.display(), "saved fitted helper artifacts");
        Ok(())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn surface(&self) -> &MultiHotCodec {
        &self.surface
    }

    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    /// The codec for a categorical base field, `None` for numeric fields.
    pub fn codec_for(&self, field: BaseField) -> Option<&CategoricalCodec> {
        match field {
            BaseField::PlayerHand => Some(&self.player_hand),
            BaseField::OpponentHand => Some(&self.opponent_hand),
            BaseField::TourneyLevel => Some(&self.tourney_level),
            BaseField::Round => Some(&self.round),
            _ => None,
        }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!(path = %path.display(), "reading artifact");
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| PredictorError::InvalidArtifact {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Codecs record the column they were fitted on.
trait FieldCodec: DeserializeOwned {
    fn field(&self) -> &str;
}

impl FieldCodec for CategoricalCodec {
    fn field(&self) -> &str {
        CategoricalCodec::field(self)
    }
}

impl FieldCodec for MultiHotCodec {
    fn field(&self) -> &str {
        MultiHotCodec::field(self)
    }
}

fn read_codec<T: FieldCodec>(dir: &Path, file: &str, expected: &str) -> Result<T> {
    let path = dir.join(file);
    let codec: T = read_json(&path)?;
    if codec.field() != expected {
        return Err(PredictorError::InvalidArtifact {
            path: path.display().to_string(),
            reason: format!("codec was fitted on {:?}, expected {expected:?}", codec.field()),
        });
    }
    Ok(codec)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}
