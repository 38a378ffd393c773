pub mod records;
pub mod predictions;
pub mod error;

pub use records::*;
pub use predictions::*;
pub use error::*;
