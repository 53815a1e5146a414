//! Position and side types

use crate::exchange::PositionSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a leveraged position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profits when price rises
    Long,
    /// Profits when price falls
    Short,
}

impl Side {
    /// Exchange order side that opens this position
    pub fn order_side(&self) -> &'static str {
        match self {
            Side::Long => "Buy",
            Side::Short => "Sell",
        }
    }

    /// Parse the exchange's position side ("Buy" / "Sell")
    pub fn from_order_side(s: &str) -> Option<Self> {
        match s {
            "Buy" => Some(Side::Long),
            "Sell" => Some(Side::Short),
            _ => None,
        }
    }

    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// True when `a` is strictly better than `b` for a stop on this side
    pub fn is_more_favorable(&self, a: Decimal, b: Decimal) -> bool {
        match self {
            Side::Long => a > b,
            Side::Short => a < b,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("unknown side '{}', expected long/buy or short/sell", other)),
        }
    }
}

/// An open position under protection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Position direction
    pub side: Side,
    /// Average entry price
    pub entry_price: Decimal,
    /// Position size in contracts
    pub quantity: Decimal,
    /// When monitoring picked the position up
    pub opened_at: DateTime<Utc>,
    /// Exchange position index (0 = one-way mode)
    pub position_idx: u8,
}

impl Position {
    /// Build a position from an exchange snapshot
    pub fn from_snapshot(snapshot: &PositionSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            side: snapshot.side,
            entry_price: snapshot.entry_price,
            quantity: snapshot.size,
            opened_at: Utc::now(),
            position_idx: snapshot.position_idx,
        }
    }

    /// Unrealized move in percent relative to entry, positive when in profit
    pub fn profit_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let diff = match self.side {
            Side::Long => price - self.entry_price,
            Side::Short => self.entry_price - price,
        };
        diff / self.entry_price * Decimal::ONE_HUNDRED
    }
}
