// Player directory: ATP player bios joined with the current rankings

use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use tennis_models::Result;

use crate::dataset::whole_number;

/// One player who appears in the labeled dataset, with their current ranking
/// when they have one. Absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub player_id: u32,
    pub name_first: Option<String>,
    pub name_last: Option<String>,
    pub hand: Option<String>,
    /// `YYYYMMDD`
    pub dob: Option<u32>,
    pub ioc: Option<String>,
    pub height: Option<f64>,
    pub wikidata_id: Option<String>,
    pub ranking_date: Option<u32>,
    pub rank: Option<u32>,
    pub player: Option<u32>,
    pub points: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PlayerRow {
    player_id: Option<f64>,
    name_first: Option<String>,
    name_last: Option<String>,
    hand: Option<String>,
    dob: Option<f64>,
    ioc: Option<String>,
    height: Option<f64>,
    wikidata_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankingRow {
    ranking_date: Option<f64>,
    rank: Option<f64>,
    player: Option<f64>,
    points: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ParticipantIds {
    player_id: Option<f64>,
    opponent_id: Option<f64>,
}

fn rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize() {
        out.push(row?);
    }
    Ok(out)
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Players referenced by the dataset, each listed once, in bio-file order.
/// A player keeps the first ranking row that names them.
pub fn join_players<P: Read, K: Read, D: Read>(
    players: P,
    rankings: K,
    dataset: D,
) -> Result<Vec<PlayerProfile>> {
    let mut known = HashSet::new();
    for ids in rows::<ParticipantIds, _>(dataset)? {
        known.extend(whole_number("player_id", ids.player_id)?);
        known.extend(whole_number("opponent_id", ids.opponent_id)?);
    }

    let mut ranked: HashMap<u32, RankingRow> = HashMap::new();
    for row in rows::<RankingRow, _>(rankings)? {
        if let Some(player) = whole_number("player", row.player)? {
            ranked.entry(player).or_insert(row);
        }
    }

    let mut seen = HashSet::new();
    let mut profiles = Vec::new();
    for row in rows::<PlayerRow, _>(players)? {
        let Some(player_id) = whole_number("player_id", row.player_id)? else {
            continue;
        };
        if !known.contains(&player_id) || !seen.insert(player_id) {
            continue;
        }
        let ranking = ranked.get(&player_id);
        let ranking_field = |field: &str, pick: fn(&RankingRow) -> Option<f64>| {
            whole_number(field, ranking.and_then(pick))
        };
        profiles.push(PlayerProfile {
            player_id,
            name_first: text(row.name_first),
            name_last: text(row.name_last),
            hand: text(row.hand),
            dob: whole_number("dob", row.dob)?,
            ioc: text(row.ioc),
            height: row.height,
            wikidata_id: text(row.wikidata_id),
            ranking_date: ranking_field("ranking_date", |r| r.ranking_date)?,
            rank: ranking_field("rank", |r| r.rank)?,
            player: ranking_field("player", |r| r.player)?,
            points: ranking_field("points", |r| r.points)?,
        });
    }
    Ok(profiles)
}

/// Re-reads the three CSV files on every call so updated rankings show up without a restart.
pub struct PlayerDirectory {
    players_path: PathBuf,
    rankings_path: PathBuf,
    dataset_path: PathBuf,
}

impl PlayerDirectory {
    pub fn new(
        players_path: impl Into<PathBuf>,
        rankings_path: impl Into<PathBuf>,
        dataset_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            players_path: players_path.into(),
            rankings_path: rankings_path.into(),
            dataset_path: dataset_path.into(),
        }
    }

    /// Blocking.
    pub fn list(&self) -> Result<Vec<PlayerProfile>> {
        let profiles = join_players(
            File::open(&self.players_path)?,
            File::open(&self.rankings_path)?,
            File::open(&self.dataset_path)?,
        )?;
        info!(
            players = profiles.len(),
            source = %self.players_path.display(),
            "player directory loaded"
        );
        Ok(profiles)
    }
}
