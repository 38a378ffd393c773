// Canonical column layout shared by every fitted model

use serde::{Deserialize, Serialize};

use tennis_models::MatchRecord;

/// How a column's value is derived from a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integer code from a `CategoricalCodec`.
    Categorical,
    Numeric,
    /// One indicator of the surface multi-hot block.
    SurfaceIndicator,
}

/// The fields occupying the fixed prefix of every feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseField {
    PlayerHand,
    PlayerHeight,
    PlayerAge,
    PlayerRank,
    PlayerRankPoints,
    OpponentHand,
    OpponentHeight,
    OpponentAge,
    OpponentRank,
    OpponentRankPoints,
    TourneyLevel,
    Round,
}

/// Canonical order of the fixed columns. Surface indicators follow.
pub const BASE_FIELDS: [BaseField; 12] = [
    BaseField::PlayerHand,
    BaseField::PlayerHeight,
    BaseField::PlayerAge,
    BaseField::PlayerRank,
    BaseField::PlayerRankPoints,
    BaseField::OpponentHand,
    BaseField::OpponentHeight,
    BaseField::OpponentAge,
    BaseField::OpponentRank,
    BaseField::OpponentRankPoints,
    BaseField::TourneyLevel,
    BaseField::Round,
];

/// Raw value of a base field before encoding.
pub enum RawValue<'a> {
    Label(Option<&'a str>),
    Number(Option<f64>),
}

impl BaseField {
    pub fn column_name(self) -> &'static str {
        match self {
            Self::PlayerHand => "player_hand",
            Self::PlayerHeight => "player_ht",
            Self::PlayerAge => "player_age",
            Self::PlayerRank => "player_rank",
            Self::PlayerRankPoints => "player_rank_points",
            Self::OpponentHand => "opponent_hand",
            Self::OpponentHeight => "opponent_ht",
            Self::OpponentAge => "opponent_age",
            Self::OpponentRank => "opponent_rank",
            Self::OpponentRankPoints => "opponent_rank_points",
            Self::TourneyLevel => "tourney_level",
            Self::Round => "round",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Self::PlayerHand | Self::OpponentHand | Self::TourneyLevel | Self::Round => {
                ColumnKind::Categorical
            }
            _ => ColumnKind::Numeric,
        }
    }

    /// Position of this field in the canonical row.
    pub fn position(self) -> usize {
        BASE_FIELDS
            .iter()
            .position(|f| *f == self)
            .unwrap_or_else(|| unreachable!("every field is listed in BASE_FIELDS"))
    }

    pub fn extract(self, record: &MatchRecord) -> RawValue<'_> {
        let (p, o) = (&record.player, &record.opponent);
        match self {
            Self::PlayerHand => RawValue::Label(p.hand.as_deref()),
            Self::PlayerHeight => RawValue::Number(p.height),
            Self::PlayerAge => RawValue::Number(p.age),
            Self::PlayerRank => RawValue::Number(p.rank.map(f64::from)),
            Self::PlayerRankPoints => RawValue::Number(p.rank_points.map(f64::from)),
            Self::OpponentHand => RawValue::Label(o.hand.as_deref()),
            Self::OpponentHeight => RawValue::Number(o.height),
            Self::OpponentAge => RawValue::Number(o.age),
            Self::OpponentRank => RawValue::Number(o.rank.map(f64::from)),
            Self::OpponentRankPoints => RawValue::Number(o.rank_points.map(f64::from)),
            Self::TourneyLevel => RawValue::Label(record.tourney_level.as_deref()),
            Self::Round => RawValue::Label(record.round.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered list of columns: the twelve base fields then one column per surface class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn new<S: AsRef<str>>(surface_classes: &[S]) -> Self {
        let base = BASE_FIELDS.iter().map(|f| FeatureColumn {
            name: f.column_name().to_string(),
            kind: f.kind(),
        });
        let surfaces = surface_classes.iter().map(|s| FeatureColumn {
            name: s.as_ref().to_string(),
            kind: ColumnKind::SurfaceIndicator,
        });
        Self {
            columns: base.chain(surfaces).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// First surface indicator column.
    pub fn surface_offset(&self) -> usize {
        BASE_FIELDS.len()
    }

    pub fn surface_width(&self) -> usize {
        self.width() - BASE_FIELDS.len()
    }
}
