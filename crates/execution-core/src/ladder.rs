//! Capital/leverage ladder and the arithmetic that drives every transition.
//!
//! All functions here are pure: sizing, TP/SL target prices, price rounding
//! to exchange precision and realized PnL.

use crate::order::Direction;
use crate::position::{CloseType, Position};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Decimals kept on realized PnL.
const PNL_DECIMALS: u32 = 4;

/// Errors from ladder configuration and ladder arithmetic.
#[derive(Debug, Error)]
pub enum LadderError {
    #[error("ladder has no levels")]
    Empty,

    #[error("level {level} is invalid: {reason}")]
    InvalidLevel { level: usize, reason: String },

    /// Level number outside `1..=len`.
    #[error("unknown ladder level {0}")]
    UnknownLevel(u32),

    /// Sizing produced a non-positive quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("failed to read ladder file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse ladder: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderLevel {
    /// Margin committed at this level (quote asset).
    pub capital: Decimal,
    pub leverage: u32,
    /// Take-profit distance as a fraction of entry (0.003 = 0.3%).
    #[serde(alias = "tp_pct")]
    pub take_profit_pct: Decimal,
    /// Stop-loss distance as a fraction of entry.
    #[serde(alias = "sl_pct")]
    pub stop_loss_pct: Decimal,
}

impl LadderLevel {
    pub fn new(
        capital: Decimal,
        leverage: u32,
        take_profit_pct: Decimal,
        stop_loss_pct: Decimal,
    ) -> Self {
        Self {
            capital,
            leverage,
            take_profit_pct,
            stop_loss_pct,
        }
    }

    /// Position notional (`capital * leverage`).
    pub fn notional(&self) -> Decimal {
        self.capital * Decimal::from(self.leverage)
    }
}

/// Ordered, validated, 1-indexed list of levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ladder {
    levels: Vec<LadderLevel>,
}

impl Default for Ladder {
    fn default() -> Self {
        let pct = Decimal::new(3, 3); // 0.003
        Self {
            levels: vec![
                LadderLevel::new(Decimal::new(10, 1), 50, pct, pct),
                LadderLevel::new(Decimal::new(20, 1), 50, pct, pct),
                LadderLevel::new(Decimal::new(45, 1), 50, pct, pct),
                LadderLevel::new(Decimal::new(95, 1), 50, pct, pct),
                LadderLevel::new(Decimal::new(160, 1), 65, pct, pct),
            ],
        }
    }
}

impl Ladder {
    /// Validate and build a ladder.
    pub fn new(levels: Vec<LadderLevel>) -> Result<Self, LadderError> {
        if levels.is_empty() {
            return Err(LadderError::Empty);
        }

        for (i, level) in levels.iter().enumerate() {
            let reason = if level.capital <= Decimal::ZERO {
                Some("capital must be positive")
            } else if level.leverage == 0 {
                Some("leverage must be positive")
            } else if level.take_profit_pct <= Decimal::ZERO || level.stop_loss_pct <= Decimal::ZERO
            {
                Some("take-profit and stop-loss percentages must be positive")
            } else if level.stop_loss_pct >= Decimal::ONE {
                Some("stop-loss percentage must be below 1")
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(LadderError::InvalidLevel {
                    level: i + 1,
                    reason: reason.to_string(),
                });
            }
        }

        Ok(Self { levels })
    }

    /// Parse a JSON array of levels.
    pub fn from_json_str(json: &str) -> Result<Self, LadderError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LadderError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Look up a level by its 1-based number.
    pub fn level(&self, level: u32) -> Result<&LadderLevel, LadderError> {
        (level as usize)
            .checked_sub(1)
            .and_then(|idx| self.levels.get(idx))
            .ok_or(LadderError::UnknownLevel(level))
    }

    pub fn levels(&self) -> &[LadderLevel] {
        &self.levels
    }

    /// Highest level number.
    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn is_max(&self, level: u32) -> bool {
        level >= self.max_level()
    }

    /// Level to arm after a stop-loss at `level`, or `None` when the chain ends.
    pub fn next_after_stop_loss(&self, level: u32) -> Option<u32> {
        (!self.is_max(level)).then_some(level + 1)
    }

    /// Sum of capital over all levels (worst-case exposure of one chain).
    pub fn total_capital(&self) -> Decimal {
        self.levels.iter().map(|l| l.capital).sum()
    }
}

/// Take-profit and stop-loss trigger prices for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectivePrices {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// Size an entry: `floor((capital * leverage) / price)` to a multiple of `step_size`.
///
/// Always rounds down so the notional never exceeds the level's budget.
pub fn quantity(
    capital: Decimal,
    leverage: u32,
    price: Decimal,
    step_size: Decimal,
) -> Result<Decimal, LadderError> {
    if price <= Decimal::ZERO || step_size <= Decimal::ZERO {
        return Err(LadderError::InvalidQuantity(format!(
            "price {} and step size {} must be positive",
            price, step_size
        )));
    }

    let steps = capital
        .checked_mul(Decimal::from(leverage))
        .and_then(|notional| notional.checked_div(price))
        .and_then(|raw| raw.checked_div(step_size))
        .ok_or_else(|| {
            LadderError::InvalidQuantity(format!(
                "{} x {} at {} is out of range with step {}",
                capital, leverage, price, step_size
            ))
        })?;
    let qty = (steps.floor() * step_size).normalize();

    if qty <= Decimal::ZERO {
        return Err(LadderError::InvalidQuantity(format!(
            "{} x {} at {} rounds to zero with step {}",
            capital, leverage, price, step_size
        )));
    }
    Ok(qty)
}

/// Number of decimals implied by an increment (`0.01` -> 2, `1` -> 0).
fn increment_decimals(increment: Decimal) -> u32 {
    if increment >= Decimal::ONE || increment <= Decimal::ZERO {
        0
    } else {
        increment.normalize().scale()
    }
}

/// Decimals allowed on prices for a symbol with this tick size.
pub fn price_precision(tick_size: Decimal) -> u32 {
    increment_decimals(tick_size)
}

/// Decimals allowed on quantities for a symbol with this step size.
pub fn quantity_precision(step_size: Decimal) -> u32 {
    increment_decimals(step_size)
}

/// Round a price (half-even) to the tick size's decimals.
pub fn round_price(price: Decimal, tick_size: Decimal) -> Decimal {
    price.round_dp_with_strategy(
        price_precision(tick_size),
        RoundingStrategy::MidpointNearestEven,
    )
}

/// TP/SL trigger prices for an entry at `entry_price`.
pub fn protective_prices(
    entry_price: Decimal,
    direction: Direction,
    level: &LadderLevel,
    tick_size: Decimal,
) -> ProtectivePrices {
    let (take_profit, stop_loss) = match direction {
        Direction::Buy => (
            entry_price * (Decimal::ONE + level.take_profit_pct),
            entry_price * (Decimal::ONE - level.stop_loss_pct),
        ),
        Direction::Sell => (
            entry_price * (Decimal::ONE - level.take_profit_pct),
            entry_price * (Decimal::ONE + level.stop_loss_pct),
        ),
    };

    ProtectivePrices {
        take_profit: round_price(take_profit, tick_size),
        stop_loss: round_price(stop_loss, tick_size),
    }
}

/// Price a close is booked at.
///
/// TP and SL closes use the theoretical trigger price of the position's level.
/// Manual closes use `close_price`, or the entry price when unknown.
pub fn try_close_price(
    ladder: &Ladder,
    position: &Position,
    close_type: CloseType,
    close_price: Option<Decimal>,
) -> Result<Decimal, LadderError> {
    let entry = position.entry_price;

    Ok(match close_type {
        CloseType::TakeProfit => {
            let pct = ladder.level(position.current_level)?.take_profit_pct;
            match position.signal {
                Direction::Buy => entry * (Decimal::ONE + pct),
                Direction::Sell => entry * (Decimal::ONE - pct),
            }
        }
        CloseType::StopLoss => {
            let pct = ladder.level(position.current_level)?.stop_loss_pct;
            match position.signal {
                Direction::Buy => entry * (Decimal::ONE - pct),
                Direction::Sell => entry * (Decimal::ONE + pct),
            }
        }
        CloseType::Manual => close_price.unwrap_or(entry),
    })
}

/// Realized PnL of closing `position`, rounded to 4 decimals.
pub fn try_realized_pnl(
    ladder: &Ladder,
    position: &Position,
    close_type: CloseType,
    close_price: Option<Decimal>,
) -> Result<Decimal, LadderError> {
    let entry = position.entry_price;
    let close = try_close_price(ladder, position, close_type, close_price)?;

    let pnl = match position.signal {
        Direction::Buy => (close - entry) * position.quantity,
        Direction::Sell => (entry - close) * position.quantity,
    };

    Ok(pnl.round_dp_with_strategy(PNL_DECIMALS, RoundingStrategy::MidpointNearestEven))
}

/// Infallible form of [`try_realized_pnl`]: any error yields zero.
///
/// Callers that care should log the error from `try_realized_pnl` first.
pub fn realized_pnl(
    ladder: &Ladder,
    position: &Position,
    close_type: CloseType,
    close_price: Option<Decimal>,
) -> Decimal {
    try_realized_pnl(ladder, position, close_type, close_price).unwrap_or(Decimal::ZERO)
}
