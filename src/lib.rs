//! Client library for an LND node's REST and WebSocket API.
//!
//! Besides the one-shot REST calls it provides a unified, cursor-paged
//! transaction history over payments and invoices ([`history`]) and
//! self-healing push subscriptions ([`stream`]). [`LndClient`] ties them
//! together.

pub mod api;
pub mod client;
pub mod config;
pub mod history;
pub mod models;
pub mod stream;
pub mod utils;

pub use client::{Error, LndClient, Result};
pub use config::{ConfigError, LndConfig};
pub use history::{HistoryAggregator, HistoryConfig, HistoryError};
pub use models::{
    HistoryFilter, NextCursor, PageResult, Transaction, TransactionStatus, TransactionType,
};
pub use stream::{
    ConnectionState, EventKind, ReconnectPolicy, StreamEvent, SubscriptionKind,
};
pub use utils::PaymentHashInput;
