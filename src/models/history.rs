//! History query and page models

use std::fmt;

use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionStatus, TransactionType};

/// Upstream collection a record or cursor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Payments,
    Invoices,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Payments => write!(f, "payments"),
            SourceKind::Invoices => write!(f, "invoices"),
        }
    }
}

/// Per-source pagination position for one aggregation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Opaque upstream index offset
    pub offset: String,
    /// Once set, the source is not queried again in this call
    pub exhausted: bool,
}

impl Cursor {
    pub fn start(offset: Option<&str>) -> Self {
        Self {
            offset: offset.unwrap_or("0").to_string(),
            exhausted: false,
        }
    }
}

/// Continuation tokens for the next round, one per source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCursor {
    pub payment_cursor: String,
    pub invoice_cursor: String,
}

/// Non-fatal pagination conditions raised by the loop guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaginationAnomaly {
    /// The source echoed the previous offset back
    DuplicateOffset { source: SourceKind, offset: String },
    /// The iteration ceiling was hit before the source ran dry
    MaxIterations { source: SourceKind, iterations: u32 },
}

impl fmt::Display for PaginationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationAnomaly::DuplicateOffset { source, offset } => write!(
                f,
                "Detected duplicate index offset {} when fetching {}. Breaking loop to prevent infinite recursion.",
                offset, source
            ),
            PaginationAnomaly::MaxIterations { source, iterations } => write!(
                f,
                "Reached maximum number of iterations ({}) when fetching {}. Some {} may be missing.",
                iterations, source, source
            ),
        }
    }
}

/// Query for the unified history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryFilter {
    /// Empty means both types
    pub types: Vec<TransactionType>,
    /// Empty means any status
    pub statuses: Vec<TransactionStatus>,
    /// Inclusive lower bound, unix seconds
    pub creation_date_start: Option<i64>,
    /// Inclusive upper bound, unix seconds
    pub creation_date_end: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub payment_cursor: Option<String>,
    pub invoice_cursor: Option<String>,
    pub fetch_all: bool,
    /// Overrides the aggregator's iteration ceiling for this call
    pub max_iterations: Option<u32>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(mut self, types: &[TransactionType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn statuses(mut self, statuses: &[TransactionStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn date_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.creation_date_start = start;
        self.creation_date_end = end;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Resume from a previously returned [`NextCursor`]
    pub fn resume(mut self, cursor: &NextCursor) -> Self {
        self.payment_cursor = Some(cursor.payment_cursor.clone());
        self.invoice_cursor = Some(cursor.invoice_cursor.clone());
        self
    }

    pub fn fetch_all(mut self, fetch_all: bool) -> Self {
        self.fetch_all = fetch_all;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn wants(&self, kind: TransactionType) -> bool {
        self.types.is_empty() || self.types.contains(&kind)
    }

    /// Post-merge status and date checks; the sources are not trusted to apply them
    pub fn matches(&self, tx: &Transaction) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&tx.status) {
            return false;
        }
        if self.creation_date_start.is_some_and(|start| tx.timestamp < start) {
            return false;
        }
        if self.creation_date_end.is_some_and(|end| tx.timestamp > end) {
            return false;
        }
        true
    }
}

/// One page of unified history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub transactions: Vec<Transaction>,
    pub total_count: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
    /// Present iff `has_more`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<NextCursor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<PaginationAnomaly>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Payment;

    fn payment_at(ts: i64, status: &str) -> Transaction {
        Transaction::from_payment(Payment {
            creation_date: ts,
            status: status.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_wants_defaults_to_both() {
        let filter = HistoryFilter::new();
        assert!(filter.wants(TransactionType::Sent));
        assert!(filter.wants(TransactionType::Received));

        let sent_only = HistoryFilter::new().types(&[TransactionType::Sent]);
        assert!(sent_only.wants(TransactionType::Sent));
        assert!(!sent_only.wants(TransactionType::Received));
    }

    #[test]
    fn test_matches_inclusive_date_bounds() {
        let filter = HistoryFilter::new().date_range(Some(100), Some(200));
        assert!(filter.matches(&payment_at(100, "SUCCEEDED")));
        assert!(filter.matches(&payment_at(200, "SUCCEEDED")));
        assert!(!filter.matches(&payment_at(99, "SUCCEEDED")));
        assert!(!filter.matches(&payment_at(201, "SUCCEEDED")));
    }

    #[test]
    fn test_matches_status() {
        let filter = HistoryFilter::new().statuses(&[TransactionStatus::Failed]);
        assert!(filter.matches(&payment_at(1, "FAILED")));
        assert!(!filter.matches(&payment_at(1, "SUCCEEDED")));
    }

    #[test]
    fn test_anomaly_messages() {
        let dup = PaginationAnomaly::DuplicateOffset {
            source: SourceKind::Payments,
            offset: "40".to_string(),
        };
        assert_eq!(
            dup.to_string(),
            "Detected duplicate index offset 40 when fetching payments. Breaking loop to prevent infinite recursion."
        );

        let max = PaginationAnomaly::MaxIterations {
            source: SourceKind::Invoices,
            iterations: 5,
        };
        assert_eq!(
            max.to_string(),
            "Reached maximum number of iterations (5) when fetching invoices. Some invoices may be missing."
        );
    }
}
