pub mod calculator;
pub mod catalog;
pub mod error;
pub mod scenario;
pub mod types;

pub use calculator::*;
pub use catalog::*;
pub use error::CalcError;
pub use scenario::*;
pub use types::*;
