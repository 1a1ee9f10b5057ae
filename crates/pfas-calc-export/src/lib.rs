pub mod breakdown;
pub mod compliance;
mod money;
pub mod error;
pub mod format;

pub use breakdown::*;
pub use compliance::*;
pub use error::ExportError;
pub use format::*;
