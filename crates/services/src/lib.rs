pub mod dataset;
pub mod predictor;
pub mod evaluator;
pub mod players;

pub use dataset::*;
pub use predictor::*;
pub use evaluator::*;
pub use players::*;
