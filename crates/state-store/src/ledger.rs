//! Append-only trade history.
//!
//! One row per open, reinforcement or close. The CSV ledger writes a header
//! the first time the file is created and assigns ids as row count + 1.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use execution_core::{CloseType, Direction, Position, ProtectivePrices};
use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    PositionOpened,
    ReinforcementOpened,
    PositionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Active,
    Closed,
}

impl LedgerEvent {
    pub fn status(&self) -> LedgerStatus {
        match self {
            Self::PositionOpened | Self::ReinforcementOpened => LedgerStatus::Active,
            Self::PositionClosed => LedgerStatus::Closed,
        }
    }
}

/// A row as written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
    pub symbol: String,
    pub direction: Direction,
    pub level: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub capital: Option<Decimal>,
    pub leverage: Option<u32>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub tp_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub sl_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub close_price: Option<Decimal>,
    pub close_type: Option<CloseType>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub profit_loss: Option<Decimal>,
    pub status: LedgerStatus,
    pub order_id: Option<String>,
    pub tp_order_id: Option<String>,
    pub sl_order_id: Option<String>,
    pub next_reinforcement_level: u32,
    /// `HH:MM:SS` from open to close, close rows only.
    pub duration: Option<String>,
}

/// Row content supplied by the engine; the ledger fills in id, time and status.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub event: LedgerEvent,
    pub symbol: String,
    pub direction: Direction,
    pub level: u32,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub capital: Option<Decimal>,
    pub leverage: Option<u32>,
    pub tp_price: Option<Decimal>,
    pub sl_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub close_type: Option<CloseType>,
    pub profit_loss: Option<Decimal>,
    pub order_id: Option<String>,
    pub tp_order_id: Option<String>,
    pub sl_order_id: Option<String>,
    pub next_reinforcement_level: u32,
    /// Used to compute the duration of close rows.
    pub opened_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Open or reinforcement row for a position that was just entered.
    pub fn opened(
        event: LedgerEvent,
        position: &Position,
        prices: ProtectivePrices,
        next_reinforcement_level: u32,
    ) -> Self {
        Self {
            event,
            symbol: position.symbol.clone(),
            direction: position.signal,
            level: position.current_level,
            entry_price: position.entry_price,
            quantity: position.quantity,
            capital: Some(position.capital),
            leverage: Some(position.leverage),
            tp_price: Some(prices.take_profit),
            sl_price: Some(prices.stop_loss),
            close_price: None,
            close_type: None,
            profit_loss: None,
            order_id: position.entry_order_id.clone(),
            tp_order_id: position.take_profit_order_id.clone(),
            sl_order_id: position.stop_loss_order_id.clone(),
            next_reinforcement_level,
            opened_at: None,
        }
    }

    /// Close row. `position` is the record as it was while active.
    pub fn closed(
        position: &Position,
        close_type: CloseType,
        close_price: Decimal,
        profit_loss: Decimal,
        next_reinforcement_level: u32,
    ) -> Self {
        Self {
            event: LedgerEvent::PositionClosed,
            symbol: position.symbol.clone(),
            direction: position.signal,
            level: position.current_level,
            entry_price: position.entry_price,
            quantity: position.quantity,
            capital: Some(position.capital),
            leverage: Some(position.leverage),
            tp_price: None,
            sl_price: None,
            close_price: Some(close_price),
            close_type: Some(close_type),
            profit_loss: Some(profit_loss),
            order_id: position.entry_order_id.clone(),
            tp_order_id: position.take_profit_order_id.clone(),
            sl_order_id: position.stop_loss_order_id.clone(),
            next_reinforcement_level,
            opened_at: Some(position.opened_at),
        }
    }

    fn into_record(self, id: u64, now: DateTime<Utc>) -> LedgerRecord {
        let duration = match (self.event, self.opened_at) {
            (LedgerEvent::PositionClosed, Some(opened_at)) => {
                Some(format_duration(now - opened_at))
            }
            _ => None,
        };

        LedgerRecord {
            id,
            recorded_at: now,
            status: self.event.status(),
            event: self.event,
            symbol: self.symbol,
            direction: self.direction,
            level: self.level,
            entry_price: self.entry_price,
            quantity: self.quantity,
            capital: self.capital,
            leverage: self.leverage,
            tp_price: self.tp_price,
            sl_price: self.sl_price,
            close_price: self.close_price,
            close_type: self.close_type,
            profit_loss: self.profit_loss,
            order_id: self.order_id,
            tp_order_id: self.tp_order_id,
            sl_order_id: self.sl_order_id,
            next_reinforcement_level: self.next_reinforcement_level,
            duration,
        }
    }
}

/// `HH:MM:SS`; hours are not wrapped at 24. Negative spans clamp to zero.
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Summary over closed rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_trades: usize,
    pub total_profit: Decimal,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub tp_count: usize,
    pub sl_count: usize,
    pub manual_count: usize,
    /// Percent of closed trades with positive PnL, 2 decimals.
    pub win_rate: Decimal,
}

impl HistoryStats {
    pub fn from_records(records: &[LedgerRecord]) -> Self {
        let mut stats = Self::default();

        for record in records.iter().filter(|r| r.status == LedgerStatus::Closed) {
            let pnl = record.profit_loss.unwrap_or_default();
            stats.total_trades += 1;
            stats.total_profit += pnl;
            if pnl > Decimal::ZERO {
                stats.winning_trades += 1;
            } else if pnl < Decimal::ZERO {
                stats.losing_trades += 1;
            }
            match record.close_type {
                Some(CloseType::TakeProfit) => stats.tp_count += 1,
                Some(CloseType::StopLoss) => stats.sl_count += 1,
                Some(CloseType::Manual) => stats.manual_count += 1,
                None => {}
            }
        }

        if stats.total_trades > 0 {
            stats.win_rate = (Decimal::from(stats.winning_trades) * Decimal::ONE_HUNDRED
                / Decimal::from(stats.total_trades))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        }
        stats
    }
}

/// Audit sink for opened and closed trades.
pub trait TradeLedger: Send + Sync {
    /// Append one row and return it as stored.
    fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, LedgerError>;

    /// Rows in insertion order; with `limit`, only the most recent `limit`.
    fn history(&self, limit: Option<usize>) -> Result<Vec<LedgerRecord>, LedgerError>;

    fn stats(&self) -> Result<HistoryStats, LedgerError> {
        Ok(HistoryStats::from_records(&self.history(None)?))
    }
}

/// Shared ledger handle.
pub type SharedLedger = Arc<dyn TradeLedger>;

fn tail(mut records: Vec<LedgerRecord>, limit: Option<usize>) -> Vec<LedgerRecord> {
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records = records.split_off(skip);
    }
    records
}

/// CSV file ledger.
#[derive(Debug)]
pub struct CsvLedger {
    path: PathBuf,
    /// Id of the next row; held while appending.
    next_id: Mutex<u64>,
}

impl CsvLedger {
    /// Open (or create on first append) the ledger at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let existing = if path.exists() {
            Self::read_all(&path)?.len() as u64
        } else {
            0
        };

        tracing::info!(path = %path.display(), rows = existing, "Trade ledger opened");

        Ok(Self {
            path,
            next_id: Mutex::new(existing + 1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(path: &Path) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut reader = csv::Reader::from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<LedgerRecord>, csv::Error>>()?;
        Ok(records)
    }
}

impl TradeLedger for CsvLedger {
    fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, LedgerError> {
        let mut next_id = self.next_id.lock();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_headers = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_headers)
            .from_writer(file);

        let record = entry.into_record(*next_id, Utc::now());
        writer.serialize(&record)?;
        writer.flush()?;
        *next_id += 1;

        tracing::info!(
            id = record.id,
            event = ?record.event,
            symbol = %record.symbol,
            level = record.level,
            "Ledger row appended"
        );
        Ok(record)
    }

    fn history(&self, limit: Option<usize>) -> Result<Vec<LedgerRecord>, LedgerError> {
        // hold the append lock so a half-written row is never read
        let _guard = self.next_id.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(tail(Self::read_all(&self.path)?, limit))
    }
}

/// In-memory ledger (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Rows with the given event type.
    pub fn events(&self, event: LedgerEvent) -> Vec<LedgerRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.event == event)
            .cloned()
            .collect()
    }
}

impl TradeLedger for MemoryLedger {
    fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, LedgerError> {
        let mut records = self.records.lock();
        let record = entry.into_record(records.len() as u64 + 1, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    fn history(&self, limit: Option<usize>) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(tail(self.records.lock().clone(), limit))
    }
}
