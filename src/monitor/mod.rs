//! Position monitor module
//!
//! Polls position and price on a fixed cadence, feeds the trailing-stop
//! engine and pushes changed stops to the exchange with bounded retry.

mod retry;
mod runner;

pub use retry::RetryPolicy;
pub use runner::PositionMonitor;

use crate::risk::Position;
use crate::stop::StopError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Why a monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationReason {
    /// Exchange reports no open position
    PositionClosed,
    /// Session deadline elapsed
    Deadline,
    /// Cancellation token fired
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::PositionClosed => write!(f, "position closed"),
            TerminationReason::Deadline => write!(f, "session deadline"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Monitor setup errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Stop(#[from] StopError),
    /// Loop settings that cannot run
    #[error("Invalid monitor configuration: {0}")]
    InvalidConfig(String),
}

/// Run a monitor on its own task
pub fn spawn_monitor(
    monitor: PositionMonitor,
    position: Position,
) -> JoinHandle<Result<TerminationReason, MonitorError>> {
    tokio::spawn(async move { monitor.run(position).await })
}
