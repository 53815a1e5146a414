//! Trailing-stop module
//!
//! The Initial → Armed → Trailing state machine that decides which stop
//! price a position should carry at each tick.

mod engine;
mod types;

pub use engine::TrailingStop;
pub use types::{StopError, StopPhase, StopState};
