// 5.0 drift.rs: the difficulty mechanic. each tier walks the price with a
// different directional tilt, and the walk leans against whichever side the
// player has committed to. pure in the injected rng so bias is testable.

use crate::position::Position;
use crate::types::{floor_price, Difficulty, Side};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Bias contributed by each open position in the symbol: -0.002 per long,
/// +0.002 per short. Unweighted by quantity.
const BIAS_PER_POSITION: Decimal = dec!(0.002);

pub fn exposure_bias(positions: &[Position], symbol: &str) -> Decimal {
    positions
        .iter()
        .filter(|p| p.symbol == symbol && !p.is_closed())
        .map(|p| match p.side {
            Side::Long => -BIAS_PER_POSITION,
            Side::Short => BIAS_PER_POSITION,
        })
        .sum()
}

/// Next price for one symbol, one tick.
///
/// RealWorld is not computed here: the caller substitutes the external
/// snapshot value, keeping the previous price when the feed has nothing.
pub fn next_price<R: Rng>(
    current: Decimal,
    tier: Difficulty,
    bias: Decimal,
    rng: &mut R,
) -> Decimal {
    let step = match tier {
        Difficulty::RealWorld => return current,
        // upward-biased walk, the step is always added
        Difficulty::Easy => current * (uniform(rng, 0.001, 0.005) + bias),
        // slight edge to the player: up 45%, down 55%
        Difficulty::Medium => {
            let magnitude = current * (uniform(rng, 0.002, 0.008) + bias.abs());
            direction(rng, 0.45) * magnitude
        }
        Difficulty::Hard => {
            let magnitude = current * (uniform(rng, 0.003, 0.011) + bias.abs());
            direction(rng, 0.65) * magnitude
        }
    };
    floor_price(current + step)
}

fn uniform<R: Rng>(rng: &mut R, low: f64, high: f64) -> Decimal {
    Decimal::from_f64(rng.random_range(low..high)).unwrap_or(Decimal::ZERO)
}

fn direction<R: Rng>(rng: &mut R, up_probability: f64) -> Decimal {
    if rng.random_bool(up_probability) {
        Decimal::ONE
    } else {
        -Decimal::ONE
    }
}
