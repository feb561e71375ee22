// 10.0 bots.rs: leaderboard filler. each session gets a roster of simulated
// opponents whose PnL wanders plausibly. no holdings, no liquidation, no
// ledger behind the numbers.

use crate::types::{round_balance, MAJORS};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BOT_NAMES: [&str; 10] = [
    "mooncricket", "satoshi_jr", "leverage_larry", "dip_buyer", "wick_hunter",
    "paper_hands", "degen_dave", "margin_call_mia", "hodl_henry", "exit_liquidity",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: u32,
    pub name: String,
    pub balance: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Build a roster seeded with the session's starting balance.
pub fn spawn_roster<R: Rng>(count: usize, starting_balance: Decimal, rng: &mut R) -> Vec<Bot> {
    (0..count)
        .map(|i| {
            let name = BOT_NAMES[rng.random_range(0..BOT_NAMES.len())];
            Bot {
                id: i as u32,
                name: format!("{}_{}", name, rng.random_range(10..100)),
                balance: starting_balance,
                realized_pnl: Decimal::ZERO,
                unrealized_pnl: Decimal::ZERO,
            }
        })
        .collect()
}

/// One tick of cosmetic activity: every bot fakes a leveraged position in a
/// random major and nudges its running totals.
pub fn advance_bots<R: Rng>(bots: &mut [Bot], prices: &HashMap<String, Decimal>, rng: &mut R) {
    for bot in bots.iter_mut() {
        let symbol = MAJORS[rng.random_range(0..MAJORS.len())];
        let Some(price) = prices.get(symbol).copied().filter(|p| *p > Decimal::ZERO) else {
            continue;
        };

        // pseudo-position: notional derived from the price, random direction,
        // random leverage, a few percent of movement
        let size = dec!(500) / price;
        let direction = if rng.random_bool(0.5) { Decimal::ONE } else { -Decimal::ONE };
        let move_pct = decimal_in(rng, 0.0, 0.05);
        let leverage = Decimal::from(rng.random_range(1u32..=20));
        bot.unrealized_pnl = round_balance(direction * price * size * move_pct * leverage);

        let nudge = decimal_in(rng, -10.0, 10.0);
        bot.realized_pnl = round_balance(bot.realized_pnl + nudge);
        bot.balance = round_balance(bot.balance + nudge);
    }
}

fn decimal_in<R: Rng>(rng: &mut R, low: f64, high: f64) -> Decimal {
    Decimal::from_f64(rng.random_range(low..high)).unwrap_or(Decimal::ZERO)
}
