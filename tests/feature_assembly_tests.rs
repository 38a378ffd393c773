mod common;

use proptest::prelude::*;

use common::{Fixture, LEVELS, ROUNDS, SURFACES};
use tennis_ml::{FeatureAssembler, FittedArtifactBundle};
use tennis_models::{MatchRecord, PlayerAttributes};
use tennis_services::load_dataset;

fn player_strategy() -> impl Strategy<Value = PlayerAttributes> {
    (
        prop::option::of(prop::sample::select(vec!["L", "R"])),
        prop::option::of(160.0..215.0f64),
        prop::option::of(16.0..42.0f64),
        prop::option::of(1..2000u32),
        prop::option::of(0..16000u32),
    )
        .prop_map(|(hand, height, age, rank, rank_points)| PlayerAttributes {
            hand: hand.map(str::to_string),
            height,
            age,
            rank,
            rank_points,
        })
}

fn record_strategy() -> impl Strategy<Value = MatchRecord> {
    (
        player_strategy(),
        player_strategy(),
        prop::sample::select(SURFACES.to_vec()),
        prop::option::of(prop::sample::select(LEVELS.to_vec())),
        prop::option::of(prop::sample::select(ROUNDS.to_vec())),
    )
        .prop_map(|(player, opponent, surface, level, round)| MatchRecord {
            surface: Some(surface.to_string()),
            player,
            opponent,
            tourney_level: level.map(str::to_string),
            round: round.map(str::to_string),
            result: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rows_do_not_depend_on_batch_order(records in prop::collection::vec(record_strategy(), 1..12)) {
        let fixture = Fixture::new(60);
        let assembler = fixture.assembler();

        let forward = assembler.assemble(&records).unwrap();
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        let backward = assembler.assemble(&reversed).unwrap();

        let n = records.len();
        prop_assert_eq!(forward.width(), assembler.schema().width());
        for i in 0..n {
            prop_assert_eq!(forward.row(i), backward.row(n - 1 - i));
            let alone = assembler.assemble_one(&records[i]).unwrap();
            prop_assert_eq!(forward.row(i), alone.row(0));
            prop_assert!(forward.row(i).iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn prop_present_fields_land_in_their_columns(record in record_strategy()) {
        let fixture = Fixture::new(60);
        let assembler = fixture.assembler();
        let row = assembler.assemble_one(&record).unwrap().into_inner();
        let names = assembler.schema().names();
        let column = |name: &str| names.iter().position(|n| *n == name).unwrap();

        if let Some(height) = record.player.height {
            prop_assert_eq!(row[[0, column("player_ht")]], height);
        }
        if let Some(rank) = record.opponent.rank {
            prop_assert_eq!(row[[0, column("opponent_rank")]], f64::from(rank));
        }
        let surface = record.surface.as_deref().unwrap();
        prop_assert_eq!(row[[0, column(surface)]], 1.0);
        let hot = SURFACES.iter().filter(|s| row[[0, column(s)]] == 1.0).count();
        prop_assert_eq!(hot, 1);
    }
}

#[test]
fn test_schema_order_is_canonical() {
    let fixture = Fixture::new(60);
    let assembler = fixture.assembler();
    let mut expected = vec![
        "player_hand",
        "player_ht",
        "player_age",
        "player_rank",
        "player_rank_points",
        "opponent_hand",
        "opponent_ht",
        "opponent_age",
        "opponent_rank",
        "opponent_rank_points",
        "tourney_level",
        "round",
    ];
    expected.extend(SURFACES);
    assert_eq!(assembler.schema().names(), expected);
}

#[test]
fn test_helpers_refit_from_csv_match_saved_helpers() {
    let fixture = Fixture::new(150);
    let records = load_dataset(&fixture.dataset_path).unwrap();
    let refit = FittedArtifactBundle::fit(&records).unwrap();
    let saved = FittedArtifactBundle::load(&fixture.helpers_dir).unwrap();
    assert_eq!(refit.schema(), saved.schema());
    assert_eq!(refit.surface(), saved.surface());

    let assembler = FeatureAssembler::new(std::sync::Arc::new(refit));
    let matrix = assembler.assemble(&records).unwrap();
    assert_eq!(matrix.rows(), 150);
    assert!(matrix.view().iter().all(|v| v.is_finite()));
}

#[test]
fn test_complete_rows_are_not_altered_by_imputation() {
    let fixture = Fixture::new(60);
    let assembler = fixture.assembler();
    let record = MatchRecord::from_context(common::player_a(), common::player_b(), &common::clay_masters_qf());
    let row = assembler.assemble_one(&record).unwrap().into_inner();
    assert_eq!(row[[0, common::PLAYER_RANK]], 5.0);
    assert_eq!(row[[0, common::PLAYER_POINTS]], 4000.0);
    assert_eq!(row[[0, common::OPPONENT_RANK]], 20.0);
    assert_eq!(row[[0, common::OPPONENT_POINTS]], 1500.0);
}
