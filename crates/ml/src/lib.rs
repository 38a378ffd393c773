pub mod codec;
pub mod schema;
pub mod artifacts;
pub mod features;
pub mod models;
pub mod trees;
pub mod registry;
pub mod evaluation;

pub use codec::*;
pub use schema::*;
pub use artifacts::*;
pub use features::*;
pub use models::*;
pub use trees::*;
pub use registry::*;
pub use evaluation::*;
