//! Unified transaction history over payments and invoices.
//!
//! Both collections are paged independently upstream. The aggregator pulls
//! from each through the [`LoopGuard`], normalizes records into
//! [`Transaction`]s, merges them newest first and re-pages the merged list.

pub mod loop_guard;
pub mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::models::{ApiError, Payment};
use crate::api::LndRestClient;
use crate::models::{
    Cursor, HistoryFilter, NextCursor, PageResult, SourceKind, Transaction, TransactionType,
};

pub use loop_guard::{DrainPlan, GuardedFetch, LoopGuard, DEFAULT_MAX_ITERATIONS};
pub use source::{BatchRequest, InvoicesSource, PagedSource, PaymentsSource, RawRecord, SourceBatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Failed to fetch transaction history from {collection}: {cause}")]
    Upstream {
        collection: SourceKind,
        cause: ApiError,
    },
}

/// Aggregator tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    pub default_limit: usize,
    /// Smallest batch requested from a source
    pub batch_floor: u64,
    /// Smallest batch requested when `fetch_all` is set
    pub fetch_all_batch_floor: u64,
    pub max_iterations: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            batch_floor: 100,
            fetch_all_batch_floor: 1000,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

pub struct HistoryAggregator {
    payments: Arc<dyn PagedSource>,
    invoices: Arc<dyn PagedSource>,
    config: HistoryConfig,
    fetch_all_advised: AtomicBool,
}

impl HistoryAggregator {
    pub fn new(payments: Arc<dyn PagedSource>, invoices: Arc<dyn PagedSource>) -> Self {
        Self::with_config(payments, invoices, HistoryConfig::default())
    }

    pub fn with_config(
        payments: Arc<dyn PagedSource>,
        invoices: Arc<dyn PagedSource>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            payments,
            invoices,
            config,
            fetch_all_advised: AtomicBool::new(false),
        }
    }

    /// Aggregator over the node's REST payments and invoices endpoints
    pub fn from_client(client: Arc<LndRestClient>) -> Self {
        Self::new(
            Arc::new(PaymentsSource::new(client.clone())),
            Arc::new(InvoicesSource::new(client)),
        )
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Per-source batch size: twice the page, never below the floor
    pub fn batch_size(&self, limit: usize, fetch_all: bool) -> u64 {
        let floor = if fetch_all {
            self.config.fetch_all_batch_floor
        } else {
            self.config.batch_floor
        };
        (limit as u64).saturating_mul(2).max(floor)
    }

    pub async fn fetch_history(&self, filter: &HistoryFilter) -> Result<PageResult, HistoryError> {
        let limit = filter.limit.unwrap_or(self.config.default_limit);
        let offset = filter.offset.unwrap_or(0);

        if filter.fetch_all {
            self.advise_fetch_all();
        }

        let guard = LoopGuard::new(filter.max_iterations.unwrap_or(self.config.max_iterations));
        let batch_size = self.batch_size(limit, filter.fetch_all);
        // Each source may have to fill the whole window on its own
        let wanted = (!filter.fetch_all).then(|| offset.saturating_add(limit));
        let plan_from = |start: Option<&str>| DrainPlan {
            start: Cursor::start(start),
            batch_size,
            wanted,
            creation_date_start: filter.creation_date_start,
            creation_date_end: filter.creation_date_end,
        };

        let payments_plan = plan_from(filter.payment_cursor.as_deref());
        let invoices_plan = plan_from(filter.invoice_cursor.as_deref());

        let payments = async {
            if filter.wants(TransactionType::Sent) {
                Self::drain(&guard, self.payments.as_ref(), &payments_plan).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let invoices = async {
            if filter.wants(TransactionType::Received) {
                Self::drain(&guard, self.invoices.as_ref(), &invoices_plan).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (payments, invoices) = tokio::try_join!(payments, invoices)?;

        let mut payment_cursor = payments_plan.start;
        let mut invoice_cursor = invoices_plan.start;
        let mut anomalies = Vec::new();
        // Payments go in first so equal timestamps keep payments ahead
        let mut transactions: Vec<Transaction> = Vec::new();

        for (fetch, cursor) in [
            (payments, &mut payment_cursor),
            (invoices, &mut invoice_cursor),
        ] {
            if let Some(fetch) = fetch {
                anomalies.extend(fetch.anomaly);
                transactions.extend(fetch.records.into_iter().map(RawRecord::normalize));
                *cursor = fetch.cursor;
            }
        }

        // stable: ties keep insertion order
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions.retain(|tx| filter.matches(tx));

        let total_count = transactions.len();
        let has_more = offset.saturating_add(limit) < total_count;
        let page: Vec<Transaction> = transactions.into_iter().skip(offset).take(limit).collect();

        debug!(
            "history page: {} of {} (offset {}, limit {}, has_more {})",
            page.len(),
            total_count,
            offset,
            limit,
            has_more
        );

        Ok(PageResult {
            transactions: page,
            total_count,
            limit,
            offset,
            has_more,
            next_cursor: has_more.then(|| NextCursor {
                payment_cursor: payment_cursor.offset,
                invoice_cursor: invoice_cursor.offset,
            }),
            anomalies,
        })
    }

    /// Warn about `fetch_all` cost once per aggregator; true if this call warned
    fn advise_fetch_all(&self) -> bool {
        if self.fetch_all_advised.swap(true, Ordering::Relaxed) {
            return false;
        }
        warn!(
            "fetch_all walks every page of both collections and is inefficient for large \
             histories; prefer limit/offset or next_cursor paging"
        );
        true
    }

    /// Scan outbound payments for one hash, newest first
    pub async fn find_payment(&self, payment_hash_hex: &str) -> Result<Option<Payment>, HistoryError> {
        let plan = DrainPlan {
            start: Cursor::start(None),
            batch_size: self.config.fetch_all_batch_floor,
            wanted: None,
            creation_date_start: None,
            creation_date_end: None,
        };
        let guard = LoopGuard::new(self.config.max_iterations);
        let fetch = Self::drain(&guard, self.payments.as_ref(), &plan).await?;

        Ok(fetch.records.into_iter().find_map(|record| match record {
            RawRecord::Payment(p) if p.payment_hash.eq_ignore_ascii_case(payment_hash_hex) => Some(p),
            _ => None,
        }))
    }

    async fn drain(
        guard: &LoopGuard,
        source: &dyn PagedSource,
        plan: &DrainPlan,
    ) -> Result<GuardedFetch, HistoryError> {
        guard
            .drain(source, plan)
            .await
            .map_err(|cause| HistoryError::Upstream {
                collection: source.kind(),
                cause,
            })
    }
}
