// 4.0: open position tracking. pnl = side * (mark - entry) * qty * leverage.
// 4.1: same-side fills merge into one entry with a weighted-average price.

use crate::types::{round_balance, round_price, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub leverage: u32,
    /// Quote-equivalent capital locked against this position.
    pub margin: Decimal,
    pub liquidated: bool,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        entry_price: Decimal,
        quantity: Decimal,
        leverage: u32,
        margin: Decimal,
    ) -> Self {
        debug_assert!(quantity > Decimal::ZERO, "position quantity must be positive");
        debug_assert!(leverage >= 1, "leverage must be at least 1x");
        Self {
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            leverage,
            margin,
            liquidated: false,
        }
    }

    /// Gone from the book: fully liquidated or emptied out.
    pub fn is_closed(&self) -> bool {
        self.liquidated || self.quantity <= Decimal::ZERO
    }

    // 4.2: the pnl formula, leveraged. longs gain with price, shorts against it.
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        let raw = self.side.sign() * (mark_price - self.entry_price) * self.quantity;
        raw * Decimal::from(self.leverage)
    }

    // 4.3: deterministic function of entry, side and leverage.
    // long:  entry * (1 - 1/L)   (1x longs can never be liquidated)
    // short: entry * (1 + 1/L)
    pub fn liquidation_price(&self) -> Decimal {
        let inverse = Decimal::ONE / Decimal::from(self.leverage);
        let price = match self.side {
            Side::Long => self.entry_price * (Decimal::ONE - inverse),
            Side::Short => self.entry_price * (Decimal::ONE + inverse),
        };
        round_price(price)
    }

    /// Whether the mark price has crossed the liquidation threshold.
    pub fn is_liquidatable(&self, mark_price: Decimal) -> bool {
        let threshold = self.liquidation_price();
        match self.side {
            // a 1x long has threshold 0 and a positive mark never reaches it
            Side::Long => threshold > Decimal::ZERO && mark_price <= threshold,
            Side::Short => mark_price >= threshold,
        }
    }

    // 4.4: merge a same-side fill. entry becomes the quantity-weighted average,
    // leverage the max of both fills, margin accumulates.
    pub fn merge_fill(
        &mut self,
        fill_quantity: Decimal,
        fill_price: Decimal,
        fill_leverage: u32,
        fill_margin: Decimal,
    ) {
        debug_assert!(fill_quantity > Decimal::ZERO, "merge quantity must be positive");

        let total = self.quantity + fill_quantity;
        let weighted =
            self.quantity * self.entry_price + fill_quantity * fill_price;
        self.entry_price = round_price(weighted / total);
        self.quantity = total;
        self.leverage = self.leverage.max(fill_leverage);
        self.margin = round_balance(self.margin + fill_margin);
    }
}
