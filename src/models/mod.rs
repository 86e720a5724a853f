//! Domain models shared by the history aggregator and its callers
//!
//! Upstream record shapes live in `api::models`; everything here is the
//! normalized, source-agnostic view.

pub mod history;
pub mod transaction;

pub use history::{
    Cursor, HistoryFilter, NextCursor, PageResult, PaginationAnomaly, SourceKind,
};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
