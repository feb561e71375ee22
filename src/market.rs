// 12.0 market.rs: per-session view of the world. prices, OHLC candles and a
// synthetic order book regenerated from the mid price every tick.

use crate::config::ArenaConfig;
use crate::types::{round_price, Timestamp};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    fn opened_at(price: Decimal, time: Timestamp) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Synthetic depth ladders. Presentation only: orders execute against the
/// mid price, never against these levels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketView {
    pub prices: HashMap<String, Decimal>,
    pub candles: HashMap<String, VecDeque<Candle>>,
    pub order_book: HashMap<String, OrderBook>,
}

impl MarketView {
    pub fn seeded(prices: HashMap<String, Decimal>) -> Self {
        Self {
            prices,
            candles: HashMap::new(),
            order_book: HashMap::new(),
        }
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied().filter(|p| *p > Decimal::ZERO)
    }

    /// Rebuild candles and depth from the current price map. Ladders are
    /// always regenerated, never carried over stale.
    pub fn regenerate<R: Rng>(&mut self, now: Timestamp, cfg: &ArenaConfig, rng: &mut R) {
        for (symbol, price) in &self.prices {
            let list = self.candles.entry(symbol.clone()).or_default();
            advance_candles(list, *price, now, cfg.tick_interval_ms, cfg.candle_cap);
        }
        self.order_book = build_order_book(&self.prices, cfg, rng);
    }
}

// 12.1: candle advance. a bar older than two tick intervals is closed out and
// a fresh one opened; otherwise the live bar absorbs the new price.
pub fn advance_candles(
    list: &mut VecDeque<Candle>,
    price: Decimal,
    now: Timestamp,
    tick_interval_ms: u64,
    cap: usize,
) {
    let price = round_price(price);
    let stale_after = 2 * tick_interval_ms as i64;

    match list.back_mut() {
        Some(last) if last.time.elapsed_millis(now) < stale_after => {
            last.close = price;
            if price > last.high {
                last.high = price;
            }
            if price < last.low {
                last.low = price;
            }
        }
        _ => list.push_back(Candle::opened_at(price, now)),
    }

    while list.len() > cap {
        list.pop_front();
    }
}

// 12.2: depth ladder. level i sits (i+1) * spread_step away from mid on each
// side, with a randomized nonnegative size.
pub fn build_order_book<R: Rng>(
    prices: &HashMap<String, Decimal>,
    cfg: &ArenaConfig,
    rng: &mut R,
) -> HashMap<String, OrderBook> {
    let mut books = HashMap::with_capacity(prices.len());

    for (symbol, price) in prices {
        if *price <= Decimal::ZERO {
            continue;
        }

        let mut book = OrderBook {
            bids: Vec::with_capacity(cfg.book_levels),
            asks: Vec::with_capacity(cfg.book_levels),
        };

        for level in 0..cfg.book_levels {
            let spread = cfg.spread_step * Decimal::from(level as u32 + 1);
            book.bids.push(BookLevel {
                price: round_price(*price * (Decimal::ONE - spread)),
                size: random_depth(rng, cfg.max_level_depth),
            });
            book.asks.push(BookLevel {
                price: round_price(*price * (Decimal::ONE + spread)),
                size: random_depth(rng, cfg.max_level_depth),
            });
        }

        books.insert(symbol.clone(), book);
    }

    books
}

fn random_depth<R: Rng>(rng: &mut R, max: Decimal) -> Decimal {
    let fraction = Decimal::from_f64(rng.random_range(0.0..1.0)).unwrap_or(Decimal::ZERO);
    round_price(max * fraction)
}
