//! Order execution module
//!
//! Entry orders and idempotent protective-stop updates

mod entry;
mod gateway;
mod types;

pub use entry::EntryExecutor;
pub use gateway::StopGateway;
pub use types::{Confirmed, EntryError, GatewayFailure};
