// 7.0 config.rs: all settings in one place. tick cadence, market shape, faucet,
// seed prices. nothing here changes after startup.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    // Fixed simulation step, milliseconds
    pub tick_interval_ms: u64,
    // Candles kept per symbol before the oldest is evicted
    pub candle_cap: usize,
    // Bid and ask levels per order book side
    pub book_levels: usize,
    // Spread per level: level i sits at (i+1) * spread_step away from mid
    pub spread_step: Decimal,
    // Largest randomized depth size at any book level
    pub max_level_depth: Decimal,
    // One-shot faucet grant in the reference currency
    pub faucet_grant: Decimal,
    // Leaderboard bots per session
    pub bot_count: usize,
    // Per-tick factor bound for the synthetic provider's self-drift
    pub synthetic_drift: f64,
    // Minimum gap between repeated provider-failure log lines, seconds
    pub feed_warn_interval_secs: i64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            candle_cap: 120,
            book_levels: 8,
            spread_step: dec!(0.0015), // 0.15%
            max_level_depth: dec!(5),
            faucet_grant: dec!(10),
            bot_count: 6,
            synthetic_drift: 0.003,
            feed_warn_interval_secs: 60,
        }
    }
}

/// Default prices every provider snapshot starts from. Any symbol a feed
/// fails to report keeps its seeded value, so lookups never come back empty.
pub fn seed_prices() -> HashMap<String, Decimal> {
    let seeds = [
        ("USD", dec!(1)),
        ("BTC", dec!(67000)),
        ("ETH", dec!(3500)),
        ("SOL", dec!(150)),
        ("XRP", dec!(0.55)),
        ("BNB", dec!(600)),
    ];
    seeds
        .into_iter()
        .map(|(symbol, price)| (symbol.to_string(), price))
        .collect()
}
