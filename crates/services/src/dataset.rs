// Labeled historical dataset in the processed `final.csv` layout

use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use tennis_models::{MatchRecord, PlayerAttributes, PredictorError, Result};

/// The columns we read from one row. Any other column in the file is ignored.
#[derive(Debug, Deserialize)]
struct DatasetRow {
    surface: Option<String>,
    player_hand: Option<String>,
    player_ht: Option<f64>,
    player_age: Option<f64>,
    player_rank: Option<f64>,
    player_rank_points: Option<f64>,
    opponent_hand: Option<String>,
    opponent_ht: Option<f64>,
    opponent_age: Option<f64>,
    opponent_rank: Option<f64>,
    opponent_rank_points: Option<f64>,
    tourney_level: Option<String>,
    round: Option<String>,
    result: Option<u8>,
}

impl DatasetRow {
    fn into_record(self) -> Result<MatchRecord> {
        Ok(MatchRecord {
            surface: non_empty(self.surface),
            player: PlayerAttributes {
                hand: non_empty(self.player_hand),
                height: self.player_ht,
                age: self.player_age,
                rank: whole_number("player_rank", self.player_rank)?,
                rank_points: whole_number("player_rank_points", self.player_rank_points)?,
            },
            opponent: PlayerAttributes {
                hand: non_empty(self.opponent_hand),
                height: self.opponent_ht,
                age: self.opponent_age,
                rank: whole_number("opponent_rank", self.opponent_rank)?,
                rank_points: whole_number("opponent_rank_points", self.opponent_rank_points)?,
            },
            tourney_level: non_empty(self.tourney_level),
            round: non_empty(self.round),
            result: self.result,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Integer columns with gaps are written as floats ("12.0").
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn whole_number(field: &str, value: Option<f64>) -> Result<Option<u32>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX) && v.fract() == 0.0 => {
            Ok(Some(v as u32))
        }
        Some(v) => Err(PredictorError::schema_mismatch(
            field.to_string(),
            "a non-negative whole number",
            v,
        )),
    }
}

pub fn read_dataset<R: Read>(reader: R) -> Result<Vec<MatchRecord>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize::<DatasetRow>() {
        records.push(row?.into_record()?);
    }
    debug!(rows = records.len(), "parsed dataset");
    Ok(records)
}

pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<MatchRecord>> {
    let path = path.as_ref();
    let records = read_dataset(File::open(path)?)?;
    info!(path = %path.display(), rows = records.len(), "loaded dataset");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "tourney_id,surface,player_id,player_hand,player_ht,player_age,player_rank,player_rank_points,\
opponent_id,opponent_hand,opponent_ht,opponent_age,opponent_rank,opponent_rank_points,tourney_level,round,result";

    #[test]
    fn test_reads_rows_and_ignores_extra_columns() {
        let csv = format!(
            "{HEADER}\n\
             2019-580,Hard,104925,R,188.0,31.6,2.0,9000.0,105223,L,183.0,27.1,,,G,R128,1\n\
             2019-580,Hard,105223,L,183.0,27.1,,,104925,R,188.0,31.6,2.0,9000.0,G,R128,0\n"
        );
        let records = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.surface.as_deref(), Some("Hard"));
        assert_eq!(first.player.rank, Some(2));
        assert_eq!(first.player.rank_points, Some(9000));
        assert_eq!(first.opponent.rank, None);
        assert_eq!(first.opponent.rank_points, None);
        assert_eq!(first.result, Some(1));
        assert_eq!(records[1].player.hand.as_deref(), Some("L"));
        assert_eq!(records[1].result, Some(0));
    }

    #[test]
    fn test_empty_categoricals_are_missing() {
        let csv = format!("{HEADER}\nx,Clay,1,,,,,,2,U,,,,,A,,0\n");
        let records = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(records[0].player.hand, None);
        assert_eq!(records[0].round, None);
        assert_eq!(records[0].opponent.hand.as_deref(), Some("U"));
    }

    #[test]
    fn test_fractional_rank_is_rejected() {
        let csv = format!("{HEADER}\nx,Clay,1,R,180,25,3.5,100,2,R,180,25,4,90,A,F,1\n");
        assert!(matches!(
            read_dataset(csv.as_bytes()),
            Err(PredictorError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_number_is_csv_error() {
        let csv = format!("{HEADER}\nx,Clay,1,R,tall,25,3,100,2,R,180,25,4,90,A,F,1\n");
        assert!(matches!(read_dataset(csv.as_bytes()), Err(PredictorError::Csv(_))));
    }
}
