// trade-arena: multiplayer trading-simulation server.
// every connection gets an isolated session: synthetic or externally-fed
// prices, leveraged positions with liquidation, and a bot leaderboard, all
// advanced in lockstep by one single-writer tick scheduler.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: SessionId, Side, Difficulty, GameMode, precision
//   2.x  session.rs: per-player state: holdings, positions, PnL, faucet
//   3.x  ledger.rs: order execution, mark-to-market, liquidation
//   4.x  position.rs: position struct, leveraged PnL, merge, liquidation price
//   5.x  drift.rs: tier-biased random walk, exposure bias
//   6.x  provider.rs: per-provider price snapshots, external feeds, fallback
//   7.x  config.rs: tick cadence, market shape, seeds, faucet
//   8.x  registry.rs: session registry + tick scheduler (single-writer task)
//   9.x  protocol.rs: websocket wire messages
//   10.x bots.rs: simulated leaderboard opponents
//   11.x server.rs: axum routes: /health, /ws
//   12.x market.rs: candles, synthetic order book, market view

// simulation core
pub mod bots;
pub mod config;
pub mod drift;
pub mod ledger;
pub mod market;
pub mod position;
pub mod session;
pub mod types;

// coordination and transport
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod server;

// re exports for convenience
pub use bots::{advance_bots, spawn_roster, Bot};
pub use config::{seed_prices, ArenaConfig};
pub use ledger::{execute, mark_to_market, LedgerError, OrderReceipt, OrderRequest};
pub use market::{advance_candles, build_order_book, Candle, MarketView, OrderBook};
pub use position::Position;
pub use protocol::{ClientMessage, ServerMessage, SessionSnapshot};
pub use provider::{FeedError, ProviderBook};
pub use registry::{spawn_arena, ArenaHandle, OrderError};
pub use server::create_app;
pub use session::{Session, SessionParams};
pub use types::*;
