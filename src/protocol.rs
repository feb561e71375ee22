// 9.0 protocol.rs: the websocket wire format. messages are plain data with a
// snake_case "type" tag; all behavior lives in the registry.

use crate::bots::Bot;
use crate::market::{Candle, MarketView, OrderBook};
use crate::position::Position;
use crate::session::Session;
use crate::types::{Difficulty, GameMode, OrderSide, ProviderId, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartGame {
        player_name: String,
        difficulty: Difficulty,
        mode: GameMode,
        /// Raw provider selection; unknown values fall back to synthetic.
        price_provider: String,
    },
    PlaceOrder {
        base: String,
        quote: String,
        side: OrderSide,
        size: Decimal,
        leverage: u32,
    },
    ClaimFaucet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full sanitized session snapshot, pushed after start_game, order
    /// placement and faucet claims.
    SessionUpdate { session: SessionSnapshot },
    /// Per-tick market refresh.
    MarketUpdate {
        prices: HashMap<String, Decimal>,
        candles: HashMap<String, VecDeque<Candle>>,
        order_book: HashMap<String, OrderBook>,
        bots: Vec<Bot>,
    },
    /// Synchronous acknowledgement of a place_order.
    OrderAck {
        pair_price: Decimal,
        converted_from_usd: Decimal,
    },
    OrderRejected { error: String },
}

impl ServerMessage {
    pub fn market_update(session: &Session) -> Self {
        ServerMessage::MarketUpdate {
            prices: session.market.prices.clone(),
            candles: session.market.candles.clone(),
            order_book: session.market.order_book.clone(),
            bots: session.bots.clone(),
        }
    }

    pub fn session_update(session: &Session) -> Self {
        ServerMessage::SessionUpdate {
            session: SessionSnapshot::from(session),
        }
    }
}

/// What a position looks like on the wire: the stored fields plus the derived
/// liquidation price, so the client never recomputes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub liquidation_price: Decimal,
}

impl From<&Position> for PositionView {
    fn from(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            side: position.side,
            entry_price: position.entry_price,
            quantity: position.quantity,
            leverage: position.leverage,
            margin: position.margin,
            liquidation_price: position.liquidation_price(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub player_name: String,
    pub difficulty: Difficulty,
    pub mode: GameMode,
    pub provider: ProviderId,
    pub holdings: HashMap<String, Decimal>,
    pub positions: Vec<PositionView>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub market: MarketView,
    pub bots: Vec<Bot>,
    pub started_at: Timestamp,
    pub faucet_claimed: bool,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            player_name: session.params.player_name.clone(),
            difficulty: session.params.difficulty,
            mode: session.params.mode,
            provider: session.params.provider,
            holdings: session.holdings.clone(),
            positions: session.positions.iter().map(PositionView::from).collect(),
            realized_pnl: session.realized_pnl,
            unrealized_pnl: session.unrealized_pnl,
            market: session.market.clone(),
            bots: session.bots.clone(),
            started_at: session.started_at,
            faucet_claimed: session.faucet_claimed,
        }
    }
}
