//! Polled market and position feeds
//!
//! Last-price polling and open-position reads on top of an [`Exchange`],
//! each bounded by a call timeout.
//!
//! [`Exchange`]: crate::exchange::Exchange

mod position;
mod price;
mod types;

pub use position::PositionReader;
pub use price::PriceFeed;
pub use types::{FeedError, PriceTick};
