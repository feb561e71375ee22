//! End-to-end ledger scenarios: spot debits, margin sizing, merges,
//! liquidation accounting. Exercised through the public crate API the same
//! way the order handler drives it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trade_arena::{
    execute, mark_to_market, seed_prices, ArenaConfig, Difficulty, GameMode, LedgerError,
    OrderRequest, OrderSide, ProviderId, Session, SessionParams, Side, Timestamp,
};

fn session(mode: GameMode) -> Session {
    let mut rng = StdRng::seed_from_u64(1);
    Session::new(
        SessionParams {
            player_name: "integration".to_string(),
            difficulty: Difficulty::Easy,
            mode,
            provider: ProviderId::Synthetic,
        },
        seed_prices(),
        &ArenaConfig::default(),
        Timestamp::from_millis(0),
        &mut rng,
    )
}

fn order(base: &str, side: OrderSide, size: Decimal, leverage: u32) -> OrderRequest {
    OrderRequest {
        base: base.to_string(),
        quote: "USD".to_string(),
        side,
        size,
        leverage,
    }
}

#[test]
fn admin_spot_buy_debits_exact_cost() {
    // Admin mode: 10000 USD, BTC seeded at 67000
    let mut session = session(GameMode::Admin);

    let receipt = execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.01), 1)).unwrap();

    assert_eq!(receipt.pair_price, dec!(67000));
    assert_eq!(session.holding("USD"), dec!(9330.00));

    let pos = &session.positions[0];
    assert_eq!(pos.symbol, "BTC");
    assert_eq!(pos.side, Side::Long);
    assert_eq!(pos.quantity, dec!(0.01));
    assert_eq!(pos.entry_price, dec!(67000));
    assert_eq!(pos.leverage, 1);
    assert_eq!(pos.margin, dec!(670));
}

#[test]
fn repeat_buy_merges_at_equal_entry() {
    let mut session = session(GameMode::Admin);

    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.01), 1)).unwrap();
    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.01), 1)).unwrap();

    assert_eq!(session.positions.len(), 1);
    let pos = &session.positions[0];
    assert_eq!(pos.quantity, dec!(0.02));
    assert_eq!(pos.entry_price, dec!(67000));
    assert_eq!(pos.margin, dec!(1340));
    assert_eq!(session.holding("USD"), dec!(8660.00));
}

#[test]
fn merge_uses_quantity_weighted_entry() {
    let mut session = session(GameMode::Admin);
    session.market.prices.insert("BTC".to_string(), dec!(67000));
    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.01), 2)).unwrap();

    session.market.prices.insert("BTC".to_string(), dec!(70000));
    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.03), 2)).unwrap();

    let pos = &session.positions[0];
    // (0.01 * 67000 + 0.03 * 70000) / 0.04
    assert_eq!(pos.entry_price, dec!(69250));
    assert_eq!(pos.quantity, dec!(0.04));
}

#[test]
fn margin_and_liquidation_formulas_hold_per_leverage() {
    for (leverage, liq_price) in [
        (2u32, dec!(25000)),
        (5, dec!(40000)),
        (10, dec!(45000)),
        (200, dec!(49750)),
    ] {
        let mut session = session(GameMode::Whale);
        session.market.prices.insert("BTC".to_string(), dec!(50000));

        execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.01), leverage)).unwrap();

        let pos = &session.positions[0];
        let cost = dec!(500); // 0.01 * 50000
        assert_eq!(pos.margin, cost / Decimal::from(leverage), "margin at {leverage}x");
        assert_eq!(pos.liquidation_price(), liq_price, "liquidation at {leverage}x");
    }
}

#[test]
fn ezmode_margin_shortfall_is_rejected_without_state_change() {
    // EzMode: 1000 USD. 1 BTC at 50000 with 10x needs 5000 margin.
    let mut session = session(GameMode::EzMode);
    session.market.prices.insert("BTC".to_string(), dec!(50000));

    let err = execute(&mut session, &order("BTC", OrderSide::Buy, dec!(1), 10)).unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientMargin { .. }));
    assert_eq!(session.holding("USD"), dec!(1000));
    assert!(session.positions.is_empty());
}

#[test]
fn liquidation_removes_position_and_costs_the_margin() {
    let mut session = session(GameMode::Admin);
    session.market.prices.insert("BTC".to_string(), dec!(50000));
    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.1), 10)).unwrap();
    let margin = session.positions[0].margin;
    assert_eq!(margin, dec!(500));

    // crash through the 10x long liquidation price of 45000
    session.market.prices.insert("BTC".to_string(), dec!(44000));
    mark_to_market(&mut session);

    assert!(session.positions.is_empty());
    assert_eq!(session.realized_pnl, dec!(-500.00));
    assert_eq!(session.unrealized_pnl, Decimal::ZERO);

    // idempotent: a second pass with unchanged prices changes nothing
    mark_to_market(&mut session);
    assert_eq!(session.realized_pnl, dec!(-500.00));
    assert!(session.positions.is_empty());
}

#[test]
fn opposite_sides_are_never_netted() {
    let mut session = session(GameMode::Admin);
    session.market.prices.insert("BTC".to_string(), dec!(50000));

    execute(&mut session, &order("BTC", OrderSide::Buy, dec!(0.02), 5)).unwrap();
    execute(&mut session, &order("BTC", OrderSide::Sell, dec!(0.02), 5)).unwrap();

    assert_eq!(session.positions.len(), 2);
    let sides: Vec<Side> = session.positions.iter().map(|p| p.side).collect();
    assert!(sides.contains(&Side::Long) && sides.contains(&Side::Short));
}

#[test]
fn cross_quote_order_reports_usd_conversion() {
    // buy 1 ETH quoted in BTC with no BTC holdings: the quote leg is funded
    // by auto-converting USD, and the receipt says how much
    let mut session = session(GameMode::Admin);
    session.market.prices.insert("ETH".to_string(), dec!(3500));
    session.market.prices.insert("BTC".to_string(), dec!(70000));

    let request = OrderRequest {
        base: "ETH".to_string(),
        quote: "BTC".to_string(),
        side: OrderSide::Buy,
        size: dec!(1),
        leverage: 1,
    };
    let receipt = execute(&mut session, &request).unwrap();

    assert_eq!(receipt.pair_price, dec!(0.05));
    assert_eq!(receipt.converted_from_usd, dec!(3500));
    assert_eq!(session.holding("USD"), dec!(6500.00));
}

#[test]
fn rejected_cross_quote_order_leaves_holdings_intact() {
    let mut session = session(GameMode::EzMode);
    session.market.prices.insert("ETH".to_string(), dec!(3500));
    session.market.prices.insert("BTC".to_string(), dec!(70000));

    let request = OrderRequest {
        base: "ETH".to_string(),
        quote: "BTC".to_string(),
        side: OrderSide::Buy,
        size: dec!(50),
        leverage: 1,
    };
    let err = execute(&mut session, &request).unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    // fully transactional: not even a partial conversion sticks
    assert_eq!(session.holding("USD"), dec!(1000));
    assert_eq!(session.holding("BTC"), Decimal::ZERO);
}
