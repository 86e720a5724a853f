//! Paged source adapters, one per upstream collection.
//!
//! Payments and invoices name the same paging concepts differently
//! (`max_payments` vs `num_max_invoices`); each adapter hides that so the
//! aggregator only sees [`BatchRequest`] and [`SourceBatch`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::models::{ApiError, Invoice, ListInvoicesRequest, ListPaymentsRequest, Payment};
use crate::api::LndRestClient;
use crate::models::{SourceKind, Transaction};

/// One fetch request against a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub offset: String,
    pub max_items: u64,
    pub creation_date_start: Option<i64>,
    pub creation_date_end: Option<i64>,
}

/// Untouched upstream record
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Payment(Payment),
    Invoice(Invoice),
}

impl RawRecord {
    /// Key used to drop records repeated across batches of one source
    pub fn dedup_key(&self) -> &str {
        match self {
            RawRecord::Payment(p) => &p.payment_hash,
            RawRecord::Invoice(i) => &i.r_hash,
        }
    }

    pub fn normalize(self) -> Transaction {
        match self {
            RawRecord::Payment(p) => Transaction::from_payment(p),
            RawRecord::Invoice(i) => Transaction::from_invoice(i),
        }
    }
}

/// One batch plus the offset the source advertises for the next call
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<RawRecord>,
    pub next_offset: String,
}

#[async_trait]
pub trait PagedSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_batch(&self, request: &BatchRequest) -> Result<SourceBatch, ApiError>;
}

/// Outbound payments via GET /v1/payments
pub struct PaymentsSource {
    client: Arc<LndRestClient>,
}

impl PaymentsSource {
    pub fn new(client: Arc<LndRestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PagedSource for PaymentsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Payments
    }

    async fn fetch_batch(&self, request: &BatchRequest) -> Result<SourceBatch, ApiError> {
        let response = self
            .client
            .list_payments(&ListPaymentsRequest {
                index_offset: request.offset.clone(),
                max_payments: request.max_items,
                reversed: true,
                include_incomplete: true,
                creation_date_start: request.creation_date_start,
                creation_date_end: request.creation_date_end,
            })
            .await?;

        // Reversed pages walk backwards, so the older edge is the next position
        Ok(SourceBatch {
            records: response.payments.into_iter().map(RawRecord::Payment).collect(),
            next_offset: response.first_index_offset.to_string(),
        })
    }
}

/// Inbound invoices via GET /v1/invoices
pub struct InvoicesSource {
    client: Arc<LndRestClient>,
}

impl InvoicesSource {
    pub fn new(client: Arc<LndRestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PagedSource for InvoicesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Invoices
    }

    async fn fetch_batch(&self, request: &BatchRequest) -> Result<SourceBatch, ApiError> {
        let response = self
            .client
            .list_invoices(&ListInvoicesRequest {
                index_offset: request.offset.clone(),
                num_max_invoices: request.max_items,
                reversed: true,
                pending_only: false,
                creation_date_start: request.creation_date_start,
                creation_date_end: request.creation_date_end,
            })
            .await?;

        Ok(SourceBatch {
            records: response.invoices.into_iter().map(RawRecord::Invoice).collect(),
            next_offset: response.first_index_offset.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_invoices_source_maps_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/invoices"))
            .and(query_param("num_max_invoices", "100"))
            .and(query_param("pending_only", "false"))
            .and(query_param("reversed", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "invoices": [{"r_hash": "q80=", "state": "OPEN"}],
                "first_index_offset": "17",
                "last_index_offset": "17"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(LndRestClient::with_base_url("00".into(), server.uri()));
        let batch = InvoicesSource::new(client)
            .fetch_batch(&BatchRequest {
                offset: "0".into(),
                max_items: 100,
                creation_date_start: None,
                creation_date_end: None,
            })
            .await
            .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.next_offset, "17");
        assert_eq!(batch.records[0].dedup_key(), "q80=");
    }

    #[tokio::test]
    async fn test_payments_source_maps_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments"))
            .and(query_param("max_payments", "50"))
            .and(query_param("index_offset", "9"))
            .and(query_param("creation_date_end", "1700000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payments": [],
                "first_index_offset": "0",
                "last_index_offset": "0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(LndRestClient::with_base_url("00".into(), server.uri()));
        let batch = PaymentsSource::new(client)
            .fetch_batch(&BatchRequest {
                offset: "9".into(),
                max_items: 50,
                creation_date_start: None,
                creation_date_end: Some(1_700_000_000),
            })
            .await
            .unwrap();

        assert!(batch.records.is_empty());
    }
}
