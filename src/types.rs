// 1.0: all the primitives live here. session ids, sides, tiers, modes, providers.
// precision rules too: prices carry 4 decimal places, balances 2, floor 0.0001.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept on any stored or broadcast price.
pub const PRICE_DP: u32 = 4;
/// Decimal places kept on holdings and PnL totals.
pub const BALANCE_DP: u32 = 2;

/// The pivot currency used for cross-currency conversion.
pub const REFERENCE_CURRENCY: &str = "USD";

/// The five majors every session tracks and the bots trade.
pub const MAJORS: [&str; 5] = ["BTC", "ETH", "SOL", "XRP", "BNB"];

pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp(PRICE_DP)
}

pub fn round_balance(value: Decimal) -> Decimal {
    value.round_dp(BALANCE_DP)
}

// prices never reach zero, whatever the drift does
pub fn floor_price(value: Decimal) -> Decimal {
    round_price(value.max(dec!(0.0001)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }
}

/// Order intent on the wire. Buy opens/extends a long, sell a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn position_side(&self) -> Side {
        match self {
            OrderSide::Buy => Side::Long,
            OrderSide::Sell => Side::Short,
        }
    }
}

/// Difficulty tier. Controls the per-tick price drift bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    RealWorld,
    Easy,
    Medium,
    Hard,
}

/// Game mode. Fixes the starting balance and the leverage cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    EzMode,
    Admin,
    Whale,
}

impl GameMode {
    pub fn starting_balance(&self) -> Decimal {
        match self {
            GameMode::EzMode => dec!(1000),
            GameMode::Admin => dec!(10000),
            GameMode::Whale => dec!(25000),
        }
    }

    pub fn max_leverage(&self) -> u32 {
        match self {
            GameMode::EzMode => 200,
            // admin is the permissive debug mode
            GameMode::Admin => 1000,
            GameMode::Whale => 500,
        }
    }
}

/// A source of price data: the in-process simulation or an external feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Synthetic,
    Coingecko,
    Binance,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] =
        [ProviderId::Synthetic, ProviderId::Coingecko, ProviderId::Binance];

    /// Unknown selections fall back to the synthetic provider.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "coingecko" => ProviderId::Coingecko,
            "binance" => ProviderId::Binance,
            "synthetic" => ProviderId::Synthetic,
            other => {
                tracing::debug!(provider = other, "unknown price provider, using synthetic");
                ProviderId::Synthetic
            }
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, ProviderId::Synthetic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::Synthetic => "synthetic",
            ProviderId::Coingecko => "coingecko",
            ProviderId::Binance => "binance",
        }
    }
}

// 1.1: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn elapsed_millis(&self, later: Timestamp) -> i64 {
        later.0 - self.0
    }
}
