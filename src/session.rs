// 2.0 session.rs: one session per connected player. owns holdings, open
// positions, PnL totals, an embedded market view and the bot roster.
// created on start_game, destroyed on disconnect, no persistence.

use crate::bots::{spawn_roster, Bot};
use crate::config::ArenaConfig;
use crate::market::MarketView;
use crate::position::Position;
use crate::types::{
    round_balance, Difficulty, GameMode, ProviderId, Timestamp, MAJORS, REFERENCE_CURRENCY,
};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    pub player_name: String,
    pub difficulty: Difficulty,
    pub mode: GameMode,
    pub provider: ProviderId,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub params: SessionParams,
    /// currency symbol -> non-negative amount
    pub holdings: HashMap<String, Decimal>,
    pub positions: Vec<Position>,
    pub realized_pnl: Decimal,
    /// Pure function of current prices and open positions, recomputed on
    /// every mark. Never mutated independently.
    pub unrealized_pnl: Decimal,
    pub market: MarketView,
    pub bots: Vec<Bot>,
    pub started_at: Timestamp,
    pub faucet_claimed: bool,
}

impl Session {
    pub fn new<R: Rng>(
        params: SessionParams,
        snapshot: HashMap<String, Decimal>,
        cfg: &ArenaConfig,
        now: Timestamp,
        rng: &mut R,
    ) -> Self {
        let starting_balance = params.mode.starting_balance();

        let mut holdings = HashMap::new();
        holdings.insert(REFERENCE_CURRENCY.to_string(), starting_balance);

        let mut market = MarketView::seeded(snapshot);
        market.regenerate(now, cfg, rng);

        let bots = spawn_roster(cfg.bot_count, starting_balance, rng);

        Self {
            params,
            holdings,
            positions: Vec::new(),
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            market,
            bots,
            started_at: now,
            faucet_claimed: false,
        }
    }

    pub fn holding(&self, currency: &str) -> Decimal {
        self.holdings.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn credit(&mut self, currency: &str, amount: Decimal) {
        let entry = self.holdings.entry(currency.to_string()).or_insert(Decimal::ZERO);
        *entry = round_balance(*entry + amount);
    }

    /// Debit a holding. Amounts never go negative; callers check sufficiency
    /// before committing.
    pub fn debit(&mut self, currency: &str, amount: Decimal) {
        let entry = self.holdings.entry(currency.to_string()).or_insert(Decimal::ZERO);
        *entry = round_balance((*entry - amount).max(Decimal::ZERO));
    }

    /// One-shot broke-player grant. Only when the reference-currency holding
    /// has run dry and the flag is still unset.
    pub fn claim_faucet(&mut self, grant: Decimal) -> bool {
        if self.faucet_claimed || self.holding(REFERENCE_CURRENCY) > Decimal::ZERO {
            return false;
        }
        self.credit(REFERENCE_CURRENCY, grant);
        self.faucet_claimed = true;
        true
    }

    /// Symbols this session's tick must price: the majors plus anything the
    /// player still holds a position in.
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = MAJORS.iter().map(|s| s.to_string()).collect();
        for position in &self.positions {
            if !symbols.iter().any(|s| s == &position.symbol) {
                symbols.push(position.symbol.clone());
            }
        }
        symbols
    }

    pub fn find_position_mut(&mut self, symbol: &str, side: crate::types::Side) -> Option<&mut Position> {
        self.positions
            .iter_mut()
            .find(|p| p.symbol == symbol && p.side == side)
    }
}
