//! Pagination safety net around repeated calls to one paged source.
//!
//! Upstream paging is not guaranteed to terminate: an offset may be echoed
//! back unchanged, or batches may keep coming forever. Every multi-batch fetch
//! goes through [`LoopGuard::drain`], which stops on the first of:
//! an empty batch, a short batch, a batch with nothing new, a repeated offset,
//! the wanted record count, or the iteration ceiling.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::source::{BatchRequest, PagedSource, RawRecord};
use crate::api::models::ApiError;
use crate::models::{Cursor, PaginationAnomaly};

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// What one drain should fetch
#[derive(Debug, Clone)]
pub struct DrainPlan {
    pub start: Cursor,
    pub batch_size: u64,
    /// Stop once this many records are held; `None` drains the source
    pub wanted: Option<usize>,
    pub creation_date_start: Option<i64>,
    pub creation_date_end: Option<i64>,
}

/// Records accumulated from one source plus where it stopped
#[derive(Debug, Clone)]
pub struct GuardedFetch {
    pub records: Vec<RawRecord>,
    pub cursor: Cursor,
    pub iterations: u32,
    pub anomaly: Option<PaginationAnomaly>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopGuard {
    max_iterations: u32,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl LoopGuard {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub async fn drain(
        &self,
        source: &dyn PagedSource,
        plan: &DrainPlan,
    ) -> Result<GuardedFetch, ApiError> {
        let kind = source.kind();
        let mut cursor = plan.start.clone();
        let mut records: Vec<RawRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last_offset: Option<String> = None;
        let mut iterations = 0u32;
        let mut anomaly = None;

        while !cursor.exhausted {
            // The first batch is always fetched so callers learn the source size
            if iterations > 0 && plan.wanted.is_some_and(|wanted| records.len() >= wanted) {
                break;
            }

            if iterations >= self.max_iterations {
                let hit = PaginationAnomaly::MaxIterations {
                    source: kind,
                    iterations,
                };
                warn!("{}", hit);
                anomaly = Some(hit);
                break;
            }

            let batch = source
                .fetch_batch(&BatchRequest {
                    offset: cursor.offset.clone(),
                    max_items: plan.batch_size,
                    creation_date_start: plan.creation_date_start,
                    creation_date_end: plan.creation_date_end,
                })
                .await?;
            iterations += 1;

            debug!(
                "{} batch {}: {} records, next offset {}",
                kind,
                iterations,
                batch.records.len(),
                batch.next_offset
            );

            if batch.records.is_empty() {
                cursor.exhausted = true;
                break;
            }

            let full_batch = batch.records.len() as u64 >= plan.batch_size;
            let before = records.len();
            for record in batch.records {
                let key = record.dedup_key();
                if key.is_empty() || seen.insert(key.to_string()) {
                    records.push(record);
                }
            }

            if last_offset.as_deref() == Some(batch.next_offset.as_str()) {
                let hit = PaginationAnomaly::DuplicateOffset {
                    source: kind,
                    offset: batch.next_offset,
                };
                warn!("{}", hit);
                anomaly = Some(hit);
                cursor.exhausted = true;
                break;
            }

            last_offset = Some(batch.next_offset.clone());
            cursor.offset = batch.next_offset;

            if !full_batch || records.len() == before {
                cursor.exhausted = true;
            }
        }

        Ok(GuardedFetch {
            records,
            cursor,
            iterations,
            anomaly,
        })
    }
}
