// Shared fixtures: a synthetic labeled dataset, helpers fitted on it and six ranking-aware models
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use tennis_api::AppState;
use tennis_ml::{
    BoostedTrees, DecisionTree, FeatureAssembler, FeatureSchema, FittedArtifactBundle, FittedClassifier,
    GradientBoosting, Kernel, LogisticRegression, ModelArtifact, ModelRegistry, NearestNeighbors, NeighborWeights,
    RandomForest, SupportVectorClassifier, TreeNode,
};
use tennis_models::{MatchContext, MatchRecord, ModelId, PlayerAttributes, DEFAULT_MODEL_IDS};
use tennis_services::{EvaluatorService, PlayerDirectory, PredictorService};

pub const SURFACES: [&str; 4] = ["Carpet", "Clay", "Grass", "Hard"];
pub const LEVELS: [&str; 4] = ["A", "D", "G", "M"];
pub const ROUNDS: [&str; 6] = ["F", "QF", "R16", "R32", "RR", "SF"];

// canonical positions used by the fixture models
pub const PLAYER_RANK: usize = 3;
pub const PLAYER_POINTS: usize = 4;
pub const OPPONENT_RANK: usize = 8;
pub const OPPONENT_POINTS: usize = 9;

/// Player A from the reference scenario: right-handed, 188 cm, 27.5, ranked 5 with 4000 points.
pub fn player_a() -> PlayerAttributes {
    PlayerAttributes::new("R", 188.0, 27.5, 5, 4000)
}

/// Player B: left-handed, 180 cm, 30.1, ranked 20 with 1500 points.
pub fn player_b() -> PlayerAttributes {
    PlayerAttributes::new("L", 180.0, 30.1, 20, 1500)
}

pub fn clay_masters_qf() -> MatchContext {
    MatchContext::new("Clay", "M", "QF")
}

/// Small deterministic generator so fixtures never change between runs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn unit(&mut self) -> f64 {
        (self.next() % 10_000) as f64 / 10_000.0
    }
}

fn random_player(rng: &mut Lcg) -> PlayerAttributes {
    let rank = 1 + rng.below(300) as u32;
    PlayerAttributes {
        hand: match rng.below(20) {
            0 => None,
            1..=4 => Some("L".to_string()),
            _ => Some("R".to_string()),
        },
        height: (rng.below(10) != 0).then(|| 170.0 + rng.below(36) as f64),
        age: Some(18.0 + rng.unit() * 18.0),
        rank: (rng.below(25) != 0).then_some(rank),
        rank_points: Some((12_000 / rank).max(10)),
    }
}

/// Labeled matches where the better-ranked player wins about 70% of the time.
pub fn synthetic_records(rows: usize, seed: u64) -> Vec<MatchRecord> {
    let mut rng = Lcg(seed);
    (0..rows)
        .map(|i| {
            let player = random_player(&mut rng);
            let opponent = random_player(&mut rng);
            let favourite = match (player.rank_points, opponent.rank_points) {
                (Some(p), Some(o)) => p >= o,
                _ => true,
            };
            let upset = rng.below(10) < 3;
            MatchRecord {
                surface: Some(SURFACES[i % SURFACES.len()].to_string()),
                player,
                opponent,
                tourney_level: Some(LEVELS[i % LEVELS.len()].to_string()),
                round: Some(ROUNDS[i % ROUNDS.len()].to_string()),
                result: Some(u8::from(favourite != upset)),
            }
        })
        .collect()
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Player ids written to the dataset: row `i` is `PLAYER_IDS[i % 4]` against `PLAYER_IDS[(i + 1) % 4]`.
pub const PLAYER_IDS: [u32; 4] = [104925, 105223, 106421, 126774];

/// Renders records in the processed dataset layout, with match and player id columns.
pub fn dataset_csv(records: &[MatchRecord]) -> String {
    let mut out = String::from(
        "match_id,player_id,opponent_id,surface,player_hand,player_ht,player_age,player_rank,player_rank_points,\
         opponent_hand,opponent_ht,opponent_age,opponent_rank,opponent_rank_points,tourney_level,round,result\n",
    );
    for (i, r) in records.iter().enumerate() {
        let (p, o) = (&r.player, &r.opponent);
        writeln!(
            out,
            "{i},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            PLAYER_IDS[i % 4],
            PLAYER_IDS[(i + 1) % 4],
            cell(r.surface.as_ref()),
            cell(p.hand.as_ref()),
            cell(p.height),
            cell(p.age),
            cell(p.rank),
            cell(p.rank_points),
            cell(o.hand.as_ref()),
            cell(o.height),
            cell(o.age),
            cell(o.rank),
            cell(o.rank_points),
            cell(r.tourney_level.as_ref()),
            cell(r.round.as_ref()),
            cell(r.result),
        )
        .unwrap();
    }
    out
}

fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> DecisionTree {
    DecisionTree {
        nodes: vec![
            TreeNode::Split {
                feature,
                threshold,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: left },
            TreeNode::Leaf { value: right },
        ],
    }
}

fn row(width: usize, cells: &[(usize, f64)]) -> Vec<f64> {
    let mut values = vec![0.0; width];
    for (i, v) in cells {
        values[*i] = *v;
    }
    values
}

/// One model per family; each favours the better-ranked, higher-points participant.
pub fn ranking_aware_models(schema: &FeatureSchema) -> Vec<(&'static str, ModelArtifact)> {
    let width = schema.width();
    let names: Vec<String> = schema.names().iter().map(ToString::to_string).collect();
    let artifact = |model: FittedClassifier, with_names: bool| ModelArtifact {
        n_features: width,
        feature_names: with_names.then(|| names.clone()),
        model,
    };
    let rank_gap = row(width, &[(PLAYER_RANK, -0.02), (OPPONENT_RANK, 0.02)]);

    vec![
        (
            "logistic_regression",
            artifact(
                FittedClassifier::LogisticRegression(LogisticRegression {
                    coefficients: row(
                        width,
                        &[
                            (PLAYER_RANK, -0.02),
                            (PLAYER_POINTS, 0.0002),
                            (OPPONENT_RANK, 0.02),
                            (OPPONENT_POINTS, -0.0002),
                        ],
                    ),
                    intercept: 0.0,
                }),
                true,
            ),
        ),
        (
            "svm",
            artifact(
                FittedClassifier::Svm(SupportVectorClassifier {
                    kernel: Kernel::Linear,
                    support_vectors: vec![rank_gap],
                    dual_coefficients: vec![1.0],
                    intercept: 0.0,
                    probability_a: -1.0,
                    probability_b: 0.0,
                }),
                false,
            ),
        ),
        (
            "random_forest",
            artifact(
                FittedClassifier::RandomForest(RandomForest {
                    trees: vec![
                        stump(PLAYER_POINTS, 2000.0, 0.35, 0.8),
                        stump(OPPONENT_POINTS, 2000.0, 0.75, 0.3),
                    ],
                }),
                true,
            ),
        ),
        (
            "knn",
            artifact(
                FittedClassifier::Knn(NearestNeighbors {
                    k: 1,
                    weights: NeighborWeights::Uniform,
                    p: 2.0,
                    points: vec![
                        row(width, &[(PLAYER_POINTS, 4000.0), (OPPONENT_POINTS, 800.0)]),
                        row(width, &[(PLAYER_POINTS, 800.0), (OPPONENT_POINTS, 4000.0)]),
                    ],
                    labels: vec![1, 0],
                }),
                false,
            ),
        ),
        (
            "gradient_boosting",
            artifact(
                FittedClassifier::GradientBoosting(GradientBoosting {
                    init_log_odds: 0.0,
                    learning_rate: 0.5,
                    trees: vec![stump(PLAYER_RANK, 10.0, 1.0, -1.0), stump(OPPONENT_RANK, 10.0, -1.0, 1.0)],
                }),
                true,
            ),
        ),
        (
            "xgboost",
            artifact(
                FittedClassifier::Xgboost(BoostedTrees {
                    base_score: 0.5,
                    trees: vec![stump(OPPONENT_POINTS, 2000.0, 0.4, -0.4)],
                }),
                false,
            ),
        ),
    ]
}

// one player outside the dataset and a repeated bio row
pub const PLAYERS_CSV: &str = "player_id,name_first,name_last,hand,dob,ioc,height,wikidata_id\n\
    104925,Novak,Djokovic,R,19870522,SRB,188,Q5812\n\
    105223,Juan Martin,Del Potro,R,19880923,ARG,198,Q134720\n\
    106421,Daniil,Medvedev,R,19960211,RUS,198,\n\
    126774,Stefanos,Tsitsipas,R,19980812,GRE,193,\n\
    100001,Gardnar,Mulloy,R,19131122,USA,,\n\
    106421,Daniil,Medvedev,R,19960211,RUS,198,\n";

// Del Potro has no current ranking
pub const RANKINGS_CSV: &str = "ranking_date,rank,player,points\n\
    20240101,1,104925,11245\n\
    20240101,3,106421,7600\n\
    20240101,6,126774,4235\n";

/// Helpers, models, dataset and player files written to a temporary directory.
pub struct Fixture {
    _dir: TempDir,
    pub helpers_dir: PathBuf,
    pub models_dir: PathBuf,
    pub dataset_path: PathBuf,
    pub players_path: PathBuf,
    pub rankings_path: PathBuf,
    pub records: Vec<MatchRecord>,
}

impl Fixture {
    pub fn new(rows: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let helpers_dir = dir.path().join("helpers");
        let models_dir = dir.path().join("models");
        let dataset_path = dir.path().join("final.csv");
        let players_path = dir.path().join("atp_players.csv");
        let rankings_path = dir.path().join("atp_rankings_current.csv");

        let records = synthetic_records(rows, 42);
        let bundle = FittedArtifactBundle::fit(&records).unwrap();
        bundle.save(&helpers_dir).unwrap();

        fs::create_dir_all(&models_dir).unwrap();
        for (id, artifact) in ranking_aware_models(bundle.schema()) {
            fs::write(
                models_dir.join(format!("{id}.json")),
                serde_json::to_vec_pretty(&artifact).unwrap(),
            )
            .unwrap();
        }
        fs::write(&dataset_path, dataset_csv(&records)).unwrap();
        fs::write(&players_path, PLAYERS_CSV).unwrap();
        fs::write(&rankings_path, RANKINGS_CSV).unwrap();

        Self {
            _dir: dir,
            helpers_dir,
            models_dir,
            dataset_path,
            players_path,
            rankings_path,
            records,
        }
    }

    pub fn assembler(&self) -> FeatureAssembler {
        FeatureAssembler::new(Arc::new(FittedArtifactBundle::load(&self.helpers_dir).unwrap()))
    }

    pub fn registry(&self, assembler: &FeatureAssembler, ids: &[&str]) -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::new(
            &self.models_dir,
            assembler.schema().clone(),
            ids.iter().map(|id| ModelId::from(*id)).collect(),
        ))
    }

    pub fn predictor_with(&self, ids: &[&str]) -> PredictorService {
        let assembler = self.assembler();
        let registry = self.registry(&assembler, ids);
        PredictorService::new(assembler, registry)
    }

    pub fn predictor(&self) -> PredictorService {
        self.predictor_with(&DEFAULT_MODEL_IDS)
    }

    pub fn evaluator(&self) -> EvaluatorService {
        let assembler = self.assembler();
        let registry = self.registry(&assembler, &DEFAULT_MODEL_IDS);
        EvaluatorService::new(assembler, registry, &self.dataset_path)
    }

    pub fn app_state(&self) -> AppState {
        let assembler = self.assembler();
        let registry = self.registry(&assembler, &DEFAULT_MODEL_IDS);
        registry.warm_up();
        AppState {
            predictor: Arc::new(PredictorService::new(assembler.clone(), Arc::clone(&registry))),
            evaluator: Arc::new(EvaluatorService::new(assembler, registry, &self.dataset_path)),
            players: Arc::new(PlayerDirectory::new(
                &self.players_path,
                &self.rankings_path,
                &self.dataset_path,
            )),
        }
    }
}
