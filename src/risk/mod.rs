//! Risk module
//!
//! Position model and quantity sizing

mod position;
mod sizing;
mod types;

pub use position::{Position, Side};
pub use sizing::{size_quantity, NotionalSizer};
pub use types::SizingError;
