//! Core trading types shared by the engine and the exchange client.
//!
//! - **Orders**: `Direction`, `OrderSide`, `OrderType`, `OrderStatus`, `ProtectiveKind`
//! - **Position**: the persisted per-symbol ladder position and its transitions
//! - **Ladder**: level table plus the sizing / TP-SL / PnL arithmetic
//! - **Gateway**: the `ExchangeGateway` trait every exchange client implements
//!
//! # Ladder lifecycle
//!
//! 1. A signal opens level 1 with TP and SL legs attached
//! 2. TP fills: the chain ends
//! 3. SL fills below the last level: reinforcement is armed at the next level
//! 4. The next signal (either direction) re-enters at the armed level
//! 5. SL fills at the last level: the chain ends and the next signal starts again at level 1

mod gateway;
pub mod ladder;
mod order;
mod position;

pub use gateway::{
    ExchangeGateway, GatewayError, OpenOrder, OrderSnapshot, SharedGateway, SymbolFilters,
};
pub use ladder::{Ladder, LadderError, LadderLevel, ProtectivePrices};
pub use order::{
    generate_client_order_id, Direction, OrderSide, OrderStatus, OrderType, ProtectiveKind,
};
pub use position::{CloseType, EntryFill, Position, Protection};
