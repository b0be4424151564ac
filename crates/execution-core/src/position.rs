//! Persisted per-symbol ladder position.
//!
//! A position is either active (entry open, protective legs live), pending
//! reinforcement (stopped out with a further level armed) or closed. The
//! transition methods below are the only place these flags change, so the
//! active/pending exclusion holds for every record that gets saved.

use crate::ladder::LadderLevel;
use crate::order::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a position ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseType {
    TakeProfit,
    StopLoss,
    /// Closed outside the bot (inferred from the exchange).
    Manual,
}

impl CloseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TakeProfit => "TAKE_PROFIT",
            Self::StopLoss => "STOP_LOSS",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for CloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry order result.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub order_id: String,
    /// Average fill price, or the ticker price if the fill could not be confirmed.
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Protective leg order ids. A missing leg means placement failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Protection {
    pub take_profit_order_id: Option<String>,
    pub stop_loss_order_id: Option<String>,
}

impl Protection {
    /// At least one leg is missing.
    pub fn is_degraded(&self) -> bool {
        self.take_profit_order_id.is_none() || self.stop_loss_order_id.is_none()
    }
}

/// One symbol's position record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub signal: Direction,
    pub current_level: u32,
    pub is_active: bool,
    #[serde(default)]
    pub pending_reinforcement: bool,
    /// Level to enter at when reinforcement activates.
    #[serde(default)]
    pub next_level: Option<u32>,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub capital: Decimal,
    pub leverage: u32,
    pub entry_order_id: Option<String>,
    pub take_profit_order_id: Option<String>,
    pub stop_loss_order_id: Option<String>,
    pub opened_at: DateTime<Utc>,
    /// Dedup key of the signal that opened the chain.
    #[serde(default)]
    pub alert_id: Option<String>,
}

impl Position {
    /// A freshly opened, active position.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<String>,
        signal: Direction,
        level: u32,
        config: &LadderLevel,
        fill: EntryFill,
        protection: Protection,
        opened_at: DateTime<Utc>,
        alert_id: Option<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signal,
            current_level: level,
            is_active: true,
            pending_reinforcement: false,
            next_level: None,
            quantity: fill.quantity,
            entry_price: fill.price,
            capital: config.capital,
            leverage: config.leverage,
            entry_order_id: Some(fill.order_id),
            take_profit_order_id: protection.take_profit_order_id,
            stop_loss_order_id: protection.stop_loss_order_id,
            opened_at,
            alert_id,
        }
    }

    /// Terminal close: neither active nor pending.
    pub fn close(&mut self) {
        self.is_active = false;
        self.pending_reinforcement = false;
        self.next_level = None;
    }

    /// Stop-loss close with a further level available.
    pub fn arm_reinforcement(&mut self, next_level: u32) {
        self.is_active = false;
        self.pending_reinforcement = true;
        self.next_level = Some(next_level);
    }

    /// Re-enter at the armed level. Direction comes from the new signal.
    ///
    /// Does nothing and returns false unless reinforcement is pending and the
    /// armed level is `level` (levels never go backwards within a chain).
    pub fn reinforce(
        &mut self,
        signal: Direction,
        level: u32,
        config: &LadderLevel,
        fill: EntryFill,
        protection: Protection,
        opened_at: DateTime<Utc>,
    ) -> bool {
        if !self.pending_reinforcement || self.next_level != Some(level) {
            return false;
        }
        if level <= self.current_level {
            return false;
        }

        self.signal = signal;
        self.current_level = level;
        self.is_active = true;
        self.pending_reinforcement = false;
        self.next_level = None;
        self.quantity = fill.quantity;
        self.entry_price = fill.price;
        self.capital = config.capital;
        self.leverage = config.leverage;
        self.entry_order_id = Some(fill.order_id);
        self.take_profit_order_id = protection.take_profit_order_id;
        self.stop_loss_order_id = protection.stop_loss_order_id;
        self.opened_at = opened_at;
        true
    }

    /// Time since entry.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.opened_at
    }

    /// Neither active nor pending: the record only documents a finished chain.
    pub fn is_closed(&self) -> bool {
        !self.is_active && !self.pending_reinforcement
    }

    /// Active and pending are mutually exclusive.
    pub fn is_consistent(&self) -> bool {
        !(self.is_active && self.pending_reinforcement)
    }
}
