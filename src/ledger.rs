// 3.0 ledger.rs: order execution and mark-to-market. this is where money
// conservation and liquidation correctness live.
//
// execution is against the synthetic mid price via the USD pivot. rejected
// orders leave the session untouched: the auto-conversion is computed against
// projected balances and only applied once every sufficiency check passes.

use crate::position::Position;
use crate::session::Session;
use crate::types::{round_balance, round_price, OrderSide, REFERENCE_CURRENCY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub base: String,
    pub quote: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub leverage: u32,
}

/// Success payload returned to the caller synchronously.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub pair_price: Decimal,
    /// Reference currency spent on the automatic quote-side conversion,
    /// zero when none was needed.
    pub converted_from_usd: Decimal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("pair {base}/{quote} not supported")]
    PairNotSupported { base: String, quote: String },

    #[error("insufficient {currency} balance: need {needed}, have {available}")]
    InsufficientBalance {
        currency: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("insufficient margin: need {needed}, available {available}")]
    InsufficientMargin { needed: Decimal, available: Decimal },

    #[error("leverage {requested}x outside allowed range 1..={cap}x")]
    LeverageOutOfRange { requested: u32, cap: u32 },

    #[error("order size must be positive")]
    NonPositiveSize,
}

/// Execute an order against the session. Atomic from the caller's point of
/// view: an Err return means no holding or position changed.
pub fn execute(session: &mut Session, order: &OrderRequest) -> Result<OrderReceipt, LedgerError> {
    if order.size <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveSize);
    }

    let cap = session.params.mode.max_leverage();
    if order.leverage < 1 || order.leverage > cap {
        return Err(LedgerError::LeverageOutOfRange {
            requested: order.leverage,
            cap,
        });
    }

    // both legs priced in USD; a symbol without a price kills the order
    let (base_usd, quote_usd) = match (
        session.market.price(&order.base),
        session.market.price(&order.quote),
    ) {
        (Some(b), Some(q)) => (b, q),
        _ => {
            return Err(LedgerError::PairNotSupported {
                base: order.base.clone(),
                quote: order.quote.clone(),
            })
        }
    };

    let pair_price = round_price(base_usd / quote_usd);
    let cost = round_balance(order.size * pair_price);

    let quote_held = session.holding(&order.quote);
    let usd_held = session.holding(REFERENCE_CURRENCY);

    // auto-conversion plan: cover a quote-side shortfall from the reference
    // currency, capped by what the player actually has
    let (usd_debit, quote_credit) = if quote_held < cost
        && order.quote != REFERENCE_CURRENCY
        && usd_held > Decimal::ZERO
    {
        let shortfall = cost - quote_held;
        let usd_needed = round_balance(shortfall * quote_usd);
        let usd_debit = usd_needed.min(usd_held);
        let quote_credit = round_balance(usd_debit / quote_usd);
        (usd_debit, quote_credit)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let projected_quote = quote_held + quote_credit;

    let required = if order.leverage == 1 {
        if projected_quote < cost {
            return Err(LedgerError::InsufficientBalance {
                currency: order.quote.clone(),
                needed: cost,
                available: projected_quote,
            });
        }
        cost
    } else {
        let margin = round_balance(cost / Decimal::from(order.leverage));
        if projected_quote < margin {
            return Err(LedgerError::InsufficientMargin {
                needed: margin,
                available: projected_quote,
            });
        }
        margin
    };

    // every check passed: apply conversion, then the debit
    if usd_debit > Decimal::ZERO {
        session.debit(REFERENCE_CURRENCY, usd_debit);
        session.credit(&order.quote, quote_credit);
    }
    session.debit(&order.quote, required);

    let side = order.side.position_side();
    match session.find_position_mut(&order.base, side) {
        Some(position) => {
            position.merge_fill(order.size, pair_price, order.leverage, required);
        }
        None => {
            session.positions.push(Position::new(
                order.base.clone(),
                side,
                pair_price,
                order.size,
                order.leverage,
                required,
            ));
        }
    }

    Ok(OrderReceipt {
        pair_price,
        converted_from_usd: usd_debit,
    })
}

/// Recompute unrealized PnL from current prices and force-close anything that
/// crossed its liquidation price. Idempotent under unchanged prices.
pub fn mark_to_market(session: &mut Session) {
    let mut unrealized = Decimal::ZERO;
    let mut realized_delta = Decimal::ZERO;

    for position in session.positions.iter_mut() {
        if position.is_closed() {
            continue;
        }
        let Some(mark) = session.market.prices.get(&position.symbol).copied() else {
            continue;
        };
        if mark <= Decimal::ZERO {
            continue;
        }

        if position.is_liquidatable(mark) {
            // full loss of margin, no partial recovery
            realized_delta -= position.margin;
            position.margin = Decimal::ZERO;
            position.quantity = Decimal::ZERO;
            position.liquidated = true;
            continue;
        }

        unrealized += position.unrealized_pnl(mark);
    }

    if realized_delta != Decimal::ZERO {
        session.realized_pnl = round_balance(session.realized_pnl + realized_delta);
    }
    session.unrealized_pnl = round_balance(unrealized);

    // dead entries are dropped here and never rendered again
    session.positions.retain(|p| !p.is_closed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::test_session;
    use crate::types::{GameMode, Side};
    use rust_decimal_macros::dec;

    fn buy(base: &str, size: Decimal, leverage: u32) -> OrderRequest {
        OrderRequest {
            base: base.to_string(),
            quote: REFERENCE_CURRENCY.to_string(),
            side: OrderSide::Buy,
            size,
            leverage,
        }
    }

    fn set_price(session: &mut crate::session::Session, symbol: &str, price: Decimal) {
        session.market.prices.insert(symbol.to_string(), price);
    }

    #[test]
    fn spot_buy_debits_full_cost() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(67000));

        let receipt = execute(&mut session, &buy("BTC", dec!(0.01), 1)).unwrap();

        assert_eq!(receipt.pair_price, dec!(67000));
        assert_eq!(receipt.converted_from_usd, Decimal::ZERO);
        assert_eq!(session.holding("USD"), dec!(9330.00));

        let pos = &session.positions[0];
        assert_eq!(pos.side, Side::Long);
        assert_eq!(pos.quantity, dec!(0.01));
        assert_eq!(pos.entry_price, dec!(67000));
        assert_eq!(pos.leverage, 1);
        assert_eq!(pos.margin, dec!(670));
    }

    #[test]
    fn same_side_buys_merge() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(67000));

        execute(&mut session, &buy("BTC", dec!(0.01), 1)).unwrap();
        execute(&mut session, &buy("BTC", dec!(0.01), 1)).unwrap();

        assert_eq!(session.positions.len(), 1);
        let pos = &session.positions[0];
        assert_eq!(pos.quantity, dec!(0.02));
        assert_eq!(pos.entry_price, dec!(67000));
        assert_eq!(pos.margin, dec!(1340));
        assert_eq!(session.holding("USD"), dec!(8660.00));
    }

    #[test]
    fn opposite_sides_stay_independent() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(50000));

        execute(&mut session, &buy("BTC", dec!(0.01), 2)).unwrap();
        let mut sell = buy("BTC", dec!(0.01), 2);
        sell.side = OrderSide::Sell;
        execute(&mut session, &sell).unwrap();

        assert_eq!(session.positions.len(), 2);
        assert_eq!(session.positions[0].side, Side::Long);
        assert_eq!(session.positions[1].side, Side::Short);
    }

    #[test]
    fn unknown_symbol_is_rejected_without_state_change() {
        let mut session = test_session(GameMode::Admin);
        let before = session.holdings.clone();

        let err = execute(&mut session, &buy("WAGMI", dec!(1), 1)).unwrap_err();
        assert!(matches!(err, LedgerError::PairNotSupported { .. }));
        assert_eq!(session.holdings, before);
        assert!(session.positions.is_empty());
    }

    #[test]
    fn margin_is_cost_over_leverage() {
        let mut session = test_session(GameMode::Whale);
        set_price(&mut session, "BTC", dec!(50000));

        for (leverage, margin) in [(2u32, dec!(250)), (5, dec!(100)), (10, dec!(50)), (200, dec!(2.50))] {
            let mut s = test_session(GameMode::Whale);
            set_price(&mut s, "BTC", dec!(50000));
            execute(&mut s, &buy("BTC", dec!(0.01), leverage)).unwrap();
            assert_eq!(s.positions[0].margin, margin, "leverage {leverage}x");
            assert_eq!(s.holding("USD"), round_balance(dec!(25000) - margin));
        }
        let _ = session;
    }

    #[test]
    fn insufficient_margin_rejected_cleanly() {
        // EzMode: 1000 USD. 1 BTC at 50000 with 10x needs 5000 margin.
        let mut session = test_session(GameMode::EzMode);
        set_price(&mut session, "BTC", dec!(50000));

        let err = execute(&mut session, &buy("BTC", dec!(1), 10)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientMargin { .. }));
        assert_eq!(session.holding("USD"), dec!(1000));
        assert!(session.positions.is_empty());
    }

    #[test]
    fn spot_shortfall_is_insufficient_balance() {
        let mut session = test_session(GameMode::EzMode);
        set_price(&mut session, "BTC", dec!(50000));

        let err = execute(&mut session, &buy("BTC", dec!(1), 1)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(session.holding("USD"), dec!(1000));
    }

    #[test]
    fn leverage_cap_enforced_per_mode() {
        let mut session = test_session(GameMode::EzMode);
        set_price(&mut session, "BTC", dec!(50000));

        let err = execute(&mut session, &buy("BTC", dec!(0.001), 201)).unwrap_err();
        assert_eq!(err, LedgerError::LeverageOutOfRange { requested: 201, cap: 200 });

        let err = execute(&mut session, &buy("BTC", dec!(0.001), 0)).unwrap_err();
        assert!(matches!(err, LedgerError::LeverageOutOfRange { .. }));
    }

    #[test]
    fn cross_currency_order_converts_from_usd() {
        // buy 1 ETH quoted in BTC: pair price 3500/70000 = 0.05 BTC,
        // player holds no BTC, conversion pulls 0.05 * 70000 = 3500 USD
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "ETH", dec!(3500));
        set_price(&mut session, "BTC", dec!(70000));

        let order = OrderRequest {
            base: "ETH".to_string(),
            quote: "BTC".to_string(),
            side: OrderSide::Buy,
            size: dec!(1),
            leverage: 1,
        };
        let receipt = execute(&mut session, &order).unwrap();

        assert_eq!(receipt.pair_price, dec!(0.05));
        assert_eq!(receipt.converted_from_usd, dec!(3500));
        assert_eq!(session.holding("USD"), dec!(6500.00));
        // converted BTC was immediately spent on the order
        assert_eq!(session.holding("BTC"), Decimal::ZERO);
    }

    #[test]
    fn failed_cross_currency_order_converts_nothing() {
        // whole bankroll can't cover the cost: no partial conversion sticks
        let mut session = test_session(GameMode::EzMode);
        set_price(&mut session, "ETH", dec!(3500));
        set_price(&mut session, "BTC", dec!(70000));

        let order = OrderRequest {
            base: "ETH".to_string(),
            quote: "BTC".to_string(),
            side: OrderSide::Buy,
            size: dec!(10),
            leverage: 1,
        };
        let err = execute(&mut session, &order).unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(session.holding("USD"), dec!(1000));
        assert_eq!(session.holding("BTC"), Decimal::ZERO);
    }

    #[test]
    fn mark_to_market_totals_leveraged_pnl() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(50000));
        execute(&mut session, &buy("BTC", dec!(0.1), 5)).unwrap();

        set_price(&mut session, "BTC", dec!(51000));
        mark_to_market(&mut session);

        // (51000 - 50000) * 0.1 * 5 = 500
        assert_eq!(session.unrealized_pnl, dec!(500.00));
        assert_eq!(session.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn mark_to_market_is_idempotent() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(50000));
        execute(&mut session, &buy("BTC", dec!(0.1), 5)).unwrap();

        set_price(&mut session, "BTC", dec!(48000));
        mark_to_market(&mut session);
        let snapshot = (
            session.unrealized_pnl,
            session.realized_pnl,
            session.positions.len(),
        );

        mark_to_market(&mut session);
        assert_eq!(
            (session.unrealized_pnl, session.realized_pnl, session.positions.len()),
            snapshot
        );
    }

    #[test]
    fn liquidation_costs_exactly_the_margin() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(50000));
        execute(&mut session, &buy("BTC", dec!(0.1), 10)).unwrap();
        let margin = session.positions[0].margin;
        assert_eq!(margin, dec!(500));

        // 10x long liquidates at 45000
        set_price(&mut session, "BTC", dec!(44900));
        mark_to_market(&mut session);

        assert!(session.positions.is_empty());
        assert_eq!(session.realized_pnl, dec!(-500.00));
        assert_eq!(session.unrealized_pnl, Decimal::ZERO);

        // second pass removes nothing new
        mark_to_market(&mut session);
        assert_eq!(session.realized_pnl, dec!(-500.00));
    }

    #[test]
    fn short_liquidates_on_rally() {
        let mut session = test_session(GameMode::Admin);
        set_price(&mut session, "BTC", dec!(50000));

        let order = OrderRequest {
            base: "BTC".to_string(),
            quote: REFERENCE_CURRENCY.to_string(),
            side: OrderSide::Sell,
            size: dec!(0.1),
            leverage: 5,
        };
        execute(&mut session, &order).unwrap();

        // 5x short liquidates at 60000
        set_price(&mut session, "BTC", dec!(60000));
        mark_to_market(&mut session);

        assert!(session.positions.is_empty());
        assert_eq!(session.realized_pnl, dec!(-1000.00));
    }
}
