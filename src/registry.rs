// 8.0 registry.rs: the session registry and tick scheduler. one single-writer
// task owns every session and the provider book; order placement and ticks are
// alternatives of the same select loop, so they never overlap in time and no
// locking is needed around session state.

use crate::bots::advance_bots;
use crate::config::ArenaConfig;
use crate::drift;
use crate::ledger::{self, LedgerError, OrderReceipt, OrderRequest};
use crate::protocol::ServerMessage;
use crate::provider::ProviderBook;
use crate::session::{Session, SessionParams};
use crate::types::{Difficulty, ProviderId, SessionId, Timestamp};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("no active session; send start_game first")]
    NoSession,

    #[error("arena is shutting down")]
    Unavailable,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
enum TickError {
    #[error("session vanished mid-tick")]
    UnknownSession,
}

pub enum ArenaCommand {
    /// Register the connection's push channel. Sent once per socket.
    Connect {
        id: SessionId,
        push: mpsc::UnboundedSender<ServerMessage>,
    },
    StartGame {
        id: SessionId,
        params: SessionParams,
    },
    PlaceOrder {
        id: SessionId,
        order: OrderRequest,
        reply: oneshot::Sender<Result<OrderReceipt, OrderError>>,
    },
    ClaimFaucet {
        id: SessionId,
    },
    /// Explicit removal; a dropped connection must never leak a session.
    Disconnect {
        id: SessionId,
    },
}

/// Cheap clonable front for the arena task. One per server, shared by every
/// connection handler.
#[derive(Clone)]
pub struct ArenaHandle {
    commands: mpsc::UnboundedSender<ArenaCommand>,
    next_id: Arc<AtomicU64>,
}

impl ArenaHandle {
    /// Allocate a connection id and register its push channel.
    pub fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (push, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(ArenaCommand::Connect { id, push });
        (id, rx)
    }

    pub fn start_game(&self, id: SessionId, params: SessionParams) {
        let _ = self.commands.send(ArenaCommand::StartGame { id, params });
    }

    /// Synchronous from the caller's point of view: fully succeeds or returns
    /// an error with no session change.
    pub async fn place_order(
        &self,
        id: SessionId,
        order: OrderRequest,
    ) -> Result<OrderReceipt, OrderError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ArenaCommand::PlaceOrder { id, order, reply })
            .map_err(|_| OrderError::Unavailable)?;
        rx.await.map_err(|_| OrderError::Unavailable)?
    }

    pub fn claim_faucet(&self, id: SessionId) {
        let _ = self.commands.send(ArenaCommand::ClaimFaucet { id });
    }

    pub fn disconnect(&self, id: SessionId) {
        let _ = self.commands.send(ArenaCommand::Disconnect { id });
    }
}

/// Spawn the arena task and hand back its command front.
pub fn spawn_arena(cfg: ArenaConfig) -> ArenaHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let arena = Arena::new(cfg, rx, StdRng::from_os_rng());
    tokio::spawn(arena.run());
    ArenaHandle {
        commands: tx,
        next_id: Arc::new(AtomicU64::new(1)),
    }
}

pub struct Arena {
    cfg: ArenaConfig,
    providers: ProviderBook,
    sessions: HashMap<SessionId, Session>,
    pushes: HashMap<SessionId, mpsc::UnboundedSender<ServerMessage>>,
    commands: mpsc::UnboundedReceiver<ArenaCommand>,
    rng: StdRng,
}

impl Arena {
    fn new(cfg: ArenaConfig, commands: mpsc::UnboundedReceiver<ArenaCommand>, rng: StdRng) -> Self {
        Self {
            cfg,
            providers: ProviderBook::new(),
            sessions: HashMap::new(),
            pushes: HashMap::new(),
            commands,
            rng,
        }
    }

    // 8.1: the scheduler loop. select! serializes everything: a tick runs to
    // completion (including the awaited feed refresh) before the next tick or
    // the next command is taken. intervals missed while a tick runs are
    // skipped, not queued.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.cfg.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.cfg.tick_interval_ms, "arena scheduler running");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break, // every handle dropped, server is gone
                },
                _ = ticker.tick() => self.tick().await,
            }
        }
        info!("arena scheduler stopped");
    }

    fn handle_command(&mut self, cmd: ArenaCommand) {
        match cmd {
            ArenaCommand::Connect { id, push } => {
                self.pushes.insert(id, push);
                debug!(session = %id, "connection registered");
            }
            ArenaCommand::StartGame { id, params } => {
                let snapshot = self.providers.snapshot(params.provider);
                let session =
                    Session::new(params, snapshot, &self.cfg, Timestamp::now(), &mut self.rng);
                info!(
                    session = %id,
                    player = %session.params.player_name,
                    mode = ?session.params.mode,
                    difficulty = ?session.params.difficulty,
                    "session started"
                );
                self.sessions.insert(id, session);
                self.push(id, ServerMessage::session_update);
            }
            ArenaCommand::PlaceOrder { id, order, reply } => {
                let result = self.place_order(id, &order);
                let _ = reply.send(result);
                self.push(id, ServerMessage::session_update);
            }
            ArenaCommand::ClaimFaucet { id } => {
                let Some(session) = self.sessions.get_mut(&id) else {
                    return;
                };
                if session.claim_faucet(self.cfg.faucet_grant) {
                    debug!(session = %id, "faucet claimed");
                    self.push(id, ServerMessage::session_update);
                }
            }
            ArenaCommand::Disconnect { id } => {
                self.sessions.remove(&id);
                self.pushes.remove(&id);
                debug!(session = %id, "session removed");
            }
        }
    }

    fn place_order(
        &mut self,
        id: SessionId,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, OrderError> {
        let session = self.sessions.get_mut(&id).ok_or(OrderError::NoSession)?;
        let receipt = ledger::execute(session, order)?;
        // a fill changes exposure: remark immediately rather than waiting a tick
        ledger::mark_to_market(session);
        Ok(receipt)
    }

    // 8.2: one synchronized simulation step. the feed refresh is awaited once
    // and its result shared by every real-world session in this tick.
    async fn tick(&mut self) {
        let wanted: HashSet<ProviderId> = self
            .sessions
            .values()
            .filter(|s| s.params.difficulty == Difficulty::RealWorld)
            .map(|s| s.params.provider)
            .collect();
        if !wanted.is_empty() {
            self.providers.refresh(&wanted, &self.cfg, &mut self.rng).await;
        }
        self.step_sessions(Timestamp::now());
    }

    /// Advance every session independently. One failing session is logged and
    /// skipped; the rest still update.
    fn step_sessions(&mut self, now: Timestamp) {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        for id in ids {
            if let Err(err) = self.step_session(id, now) {
                warn!(session = %id, error = %err, "session tick failed, continuing");
            }
        }
    }

    fn step_session(&mut self, id: SessionId, now: Timestamp) -> Result<(), TickError> {
        let session = self.sessions.get_mut(&id).ok_or(TickError::UnknownSession)?;

        match session.params.difficulty {
            // real-world: the shared snapshot value is used directly; a symbol
            // the feed has nothing for keeps its previous price
            Difficulty::RealWorld => {
                for symbol in session.tracked_symbols() {
                    if let Some(price) = self.providers.price(session.params.provider, &symbol) {
                        session.market.prices.insert(symbol, price);
                    }
                }
            }
            tier => {
                for symbol in session.tracked_symbols() {
                    let Some(current) = session.market.price(&symbol) else {
                        continue;
                    };
                    let bias = drift::exposure_bias(&session.positions, &symbol);
                    let next = drift::next_price(current, tier, bias, &mut self.rng);
                    session.market.prices.insert(symbol, next);
                }
            }
        }

        session.market.regenerate(now, &self.cfg, &mut self.rng);
        advance_bots(&mut session.bots, &session.market.prices, &mut self.rng);
        ledger::mark_to_market(session);

        let message = ServerMessage::market_update(session);
        let delivered = self
            .pushes
            .get(&id)
            .is_some_and(|tx| tx.send(message).is_ok());
        if !delivered {
            // socket teardown races the Disconnect command; don't warn every
            // tick, just remove the session now
            debug!(session = %id, "push channel closed, removing session");
            self.sessions.remove(&id);
            self.pushes.remove(&id);
        }
        Ok(())
    }

    fn push<F>(&self, id: SessionId, build: F)
    where
        F: FnOnce(&Session) -> ServerMessage,
    {
        let (Some(session), Some(tx)) = (self.sessions.get(&id), self.pushes.get(&id)) else {
            return;
        };
        if tx.send(build(session)).is_err() {
            debug!(session = %id, "push channel closed");
        }
    }
}
