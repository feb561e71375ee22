// 6.0 provider.rs: one last-good price snapshot per provider. the scheduler is
// the only writer; sessions read a copy when building their market view.
//
// the synthetic provider never fails: its refresh drifts its own previous
// snapshot. external feeds are fetched over HTTP once per tick; a feed that
// reports at least one symbol counts as a successful refresh, a feed that
// reports none keeps the previous snapshot. failure logs are throttled so a
// dead feed can't flood the log.

use crate::config::{seed_prices, ArenaConfig};
use crate::types::{floor_price, round_price, ProviderId, Timestamp, REFERENCE_CURRENCY};
use rand::Rng;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const BINANCE_URL: &str = "https://api.binance.com/api/v3/ticker/price";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Coingecko asset id -> our symbol.
const COINGECKO_IDS: [(&str, &str); 5] = [
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("ripple", "XRP"),
    ("binancecoin", "BNB"),
];

/// Binance ticker symbol -> our symbol.
const BINANCE_PAIRS: [(&str, &str); 5] = [
    ("BTCUSDT", "BTC"),
    ("ETHUSDT", "ETH"),
    ("SOLUSDT", "SOL"),
    ("XRPUSDT", "XRP"),
    ("BNBUSDT", "BNB"),
];

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed reported no usable symbols")]
    Empty,
}

impl FeedError {
    /// Error class for log throttling: one warn per class per interval.
    fn class(&self) -> &'static str {
        match self {
            FeedError::Http(_) => "http",
            FeedError::Empty => "empty",
        }
    }
}

/// Binance `/ticker/price` row. Prices arrive as strings.
#[derive(Debug, Deserialize)]
struct BinanceTicker {
    symbol: String,
    price: String,
}

pub struct ProviderBook {
    http: Client,
    snapshots: HashMap<ProviderId, HashMap<String, Decimal>>,
    /// (provider, error class) -> last time a failure was logged.
    last_warn: HashMap<(ProviderId, &'static str), Timestamp>,
}

impl Default for ProviderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderBook {
    pub fn new() -> Self {
        let snapshots = ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, seed_prices()))
            .collect();
        Self {
            http: Client::new(),
            snapshots,
            last_warn: HashMap::new(),
        }
    }

    /// Copy of a provider's current snapshot. Every symbol in the seed set has
    /// a definite value even if the feed has never reported it.
    pub fn snapshot(&self, provider: ProviderId) -> HashMap<String, Decimal> {
        self.snapshots.get(&provider).cloned().unwrap_or_else(seed_prices)
    }

    pub fn price(&self, provider: ProviderId, symbol: &str) -> Option<Decimal> {
        self.snapshots
            .get(&provider)?
            .get(symbol)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
    }

    // 6.1: one refresh pass, awaited once per tick. no retries within a pass;
    // the next tick is the retry.
    pub async fn refresh<R: Rng>(
        &mut self,
        providers: &HashSet<ProviderId>,
        cfg: &ArenaConfig,
        rng: &mut R,
    ) {
        for provider in ProviderId::ALL {
            if !providers.contains(&provider) {
                continue;
            }
            if provider == ProviderId::Synthetic {
                self.drift_synthetic(cfg, rng);
                continue;
            }

            let result = match self.fetch(provider).await {
                Ok(update) => self.apply_update(provider, update),
                Err(err) => Err(err),
            };
            match result {
                Ok(count) => {
                    debug!(provider = provider.name(), symbols = count, "feed refreshed");
                }
                Err(err) => {
                    if self.should_log(provider, err.class(), Timestamp::now(), cfg.feed_warn_interval_secs) {
                        warn!(
                            provider = provider.name(),
                            error = %err,
                            "feed refresh failed, serving last good snapshot"
                        );
                    }
                }
            }
        }
    }

    // 6.2: synthetic refresh. each symbol wanders by a small random factor;
    // the reference currency stays pinned at 1.
    pub fn drift_synthetic<R: Rng>(&mut self, cfg: &ArenaConfig, rng: &mut R) {
        let snapshot = self.snapshots.entry(ProviderId::Synthetic).or_insert_with(seed_prices);
        for (symbol, price) in snapshot.iter_mut() {
            if symbol == REFERENCE_CURRENCY {
                continue;
            }
            let factor = 1.0 + rng.random_range(-cfg.synthetic_drift..cfg.synthetic_drift);
            let factor = Decimal::from_f64(factor).unwrap_or(Decimal::ONE);
            *price = floor_price(*price * factor);
        }
    }

    /// Merge a fetched price map over the provider's snapshot. Symbols the
    /// feed failed to report keep their previous value. An empty update is a
    /// failed refresh and changes nothing.
    pub fn apply_update(
        &mut self,
        provider: ProviderId,
        update: HashMap<String, Decimal>,
    ) -> Result<usize, FeedError> {
        if update.is_empty() {
            return Err(FeedError::Empty);
        }
        let count = update.len();
        let snapshot = self.snapshots.entry(provider).or_insert_with(seed_prices);
        for (symbol, price) in update {
            snapshot.insert(symbol, round_price(price));
        }
        Ok(count)
    }

    async fn fetch(&self, provider: ProviderId) -> Result<HashMap<String, Decimal>, FeedError> {
        match provider {
            ProviderId::Coingecko => self.fetch_coingecko().await,
            ProviderId::Binance => self.fetch_binance().await,
            // defensive: the synthetic provider never reaches here
            ProviderId::Synthetic => Ok(HashMap::new()),
        }
    }

    async fn fetch_coingecko(&self) -> Result<HashMap<String, Decimal>, FeedError> {
        let ids = COINGECKO_IDS.map(|(id, _)| id).join(",");
        let body: HashMap<String, HashMap<String, f64>> = self
            .http
            .get(COINGECKO_URL)
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut prices = HashMap::new();
        for (id, symbol) in COINGECKO_IDS {
            // per-symbol tolerance: a missing or non-positive quote is skipped
            let Some(usd) = body.get(id).and_then(|quotes| quotes.get("usd")) else {
                continue;
            };
            if let Some(price) = Decimal::from_f64(*usd).filter(|p| *p > Decimal::ZERO) {
                prices.insert(symbol.to_string(), price);
            }
        }
        Ok(prices)
    }

    async fn fetch_binance(&self) -> Result<HashMap<String, Decimal>, FeedError> {
        let symbols = format!(
            "[{}]",
            BINANCE_PAIRS.map(|(pair, _)| format!("\"{pair}\"")).join(",")
        );
        let body: Vec<BinanceTicker> = self
            .http
            .get(BINANCE_URL)
            .query(&[("symbols", symbols.as_str())])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut prices = HashMap::new();
        for ticker in body {
            let Some((_, symbol)) = BINANCE_PAIRS.iter().find(|(pair, _)| *pair == ticker.symbol)
            else {
                continue;
            };
            // unparseable rows are skipped, not fatal
            if let Some(price) = ticker.price.parse::<Decimal>().ok().filter(|p| *p > Decimal::ZERO) {
                prices.insert(symbol.to_string(), price);
            }
        }
        Ok(prices)
    }

    /// Throttle gate: at most one warn per (provider, error class) per
    /// interval.
    fn should_log(
        &mut self,
        provider: ProviderId,
        class: &'static str,
        now: Timestamp,
        interval_secs: i64,
    ) -> bool {
        let key = (provider, class);
        match self.last_warn.get(&key) {
            Some(last) if last.elapsed_millis(now) < interval_secs * 1000 => false,
            _ => {
                self.last_warn.insert(key, now);
                true
            }
        }
    }
}
