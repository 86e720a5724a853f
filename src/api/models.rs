use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upstream encodes 64-bit integers as JSON strings; older builds and test
/// fixtures sometimes use plain numbers. Accept both.
pub(crate) mod int_str {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match IntOrString::deserialize(deserializer)? {
            IntOrString::Int(n) => Ok(n),
            IntOrString::Str(s) if s.is_empty() => Ok(0),
            IntOrString::Str(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// Response from GET /v1/getinfo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    pub identity_pubkey: String,
    pub alias: String,
    pub color: String,
    pub version: String,
    pub num_active_channels: u32,
    pub num_inactive_channels: u32,
    pub num_pending_channels: u32,
    pub num_peers: u32,
    pub block_height: u32,
    pub block_hash: String,
    pub synced_to_chain: bool,
    pub synced_to_graph: bool,
    pub uris: Vec<String>,
    pub chains: Vec<Chain>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chain {
    pub chain: String,
    pub network: String,
}

/// Satoshi / millisatoshi pair used by channel balances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amount {
    #[serde(deserialize_with = "int_str::deserialize")]
    pub sat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub msat: i64,
}

/// Response from GET /v1/balance/channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelBalance {
    pub local_balance: Amount,
    pub remote_balance: Amount,
    pub unsettled_local_balance: Amount,
    pub unsettled_remote_balance: Amount,
    pub pending_open_local_balance: Amount,
    pub pending_open_remote_balance: Amount,
}

/// Response from GET /v1/balance/blockchain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletBalance {
    #[serde(deserialize_with = "int_str::deserialize")]
    pub total_balance: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub confirmed_balance: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub unconfirmed_balance: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub locked_balance: i64,
}

/// Request body for POST /v1/invoices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddInvoiceRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub memo: String,
    /// Amount in satoshis, sent as a string like every 64-bit field
    pub value: String,
    /// Expiry in seconds, upstream defaults to 86400 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub private: bool,
}

impl AddInvoiceRequest {
    pub fn new(value_sat: u64, memo: impl Into<String>) -> Self {
        Self {
            memo: memo.into(),
            value: value_sat.to_string(),
            expiry: None,
            private: false,
        }
    }

    pub fn with_expiry(mut self, seconds: u64) -> Self {
        self.expiry = Some(seconds.to_string());
        self
    }
}

/// Response from POST /v1/invoices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddInvoiceResponse {
    /// Base64 payment hash
    pub r_hash: String,
    pub payment_request: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub add_index: i64,
    pub payment_addr: String,
}

/// An inbound invoice as returned by list/lookup/subscribe endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
    pub memo: String,
    /// Base64 payment hash
    pub r_hash: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub value: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub value_msat: i64,
    pub settled: bool,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub creation_date: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub settle_date: i64,
    pub payment_request: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub expiry: i64,
    pub private: bool,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub add_index: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub settle_index: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub amt_paid_sat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub amt_paid_msat: i64,
    /// OPEN, SETTLED, CANCELED or ACCEPTED
    pub state: String,
    pub is_keysend: bool,
}

/// An outbound payment as returned by list/track endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    /// Hex payment hash
    pub payment_hash: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub value_sat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub value_msat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub fee_sat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub fee_msat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub creation_date: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub creation_time_ns: i64,
    pub payment_preimage: String,
    pub payment_request: String,
    /// IN_FLIGHT, SUCCEEDED, FAILED, or legacy UNKNOWN
    pub status: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub payment_index: i64,
    pub failure_reason: String,
    pub htlcs: Vec<HtlcAttempt>,
}

impl Payment {
    /// Final hop pubkey, preferring the attempt that succeeded
    pub fn destination(&self) -> Option<&str> {
        fn last_hop(htlc: &HtlcAttempt) -> Option<&str> {
            htlc.route
                .as_ref()
                .and_then(|r| r.hops.last())
                .map(|h| h.pub_key.as_str())
        }

        self.htlcs
            .iter()
            .filter(|h| h.status == "SUCCEEDED")
            .find_map(last_hop)
            .or_else(|| self.htlcs.iter().find_map(last_hop))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtlcAttempt {
    #[serde(deserialize_with = "int_str::deserialize")]
    pub attempt_id: i64,
    pub status: String,
    pub route: Option<Route>,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub attempt_time_ns: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub resolve_time_ns: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    #[serde(deserialize_with = "int_str::deserialize")]
    pub total_amt_msat: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub total_fees_msat: i64,
    pub hops: Vec<Hop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hop {
    pub chan_id: String,
    pub pub_key: String,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub amt_to_forward_msat: i64,
}

/// Query for GET /v1/payments
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListPaymentsRequest {
    pub index_offset: String,
    pub max_payments: u64,
    pub reversed: bool,
    pub include_incomplete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_end: Option<i64>,
}

/// Response from GET /v1/payments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPaymentsResponse {
    pub payments: Vec<Payment>,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub first_index_offset: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub last_index_offset: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub total_num_payments: i64,
}

/// Query for GET /v1/invoices
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListInvoicesRequest {
    pub index_offset: String,
    pub num_max_invoices: u64,
    pub reversed: bool,
    pub pending_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_end: Option<i64>,
}

/// Response from GET /v1/invoices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListInvoicesResponse {
    pub invoices: Vec<Invoice>,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub first_index_offset: i64,
    #[serde(deserialize_with = "int_str::deserialize")]
    pub last_index_offset: i64,
}

/// Error body returned by the REST gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorResponse {
    pub code: Option<i32>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Error type for REST operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 400 Bad Request
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// 401 Unauthorized, usually a missing or wrong macaroon
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// 403 Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// 404 Not Found
    #[error("Not Found: {0}")]
    NotFound(String),
    /// 429 Too Many Requests
    #[error("Rate Limited. Retry after {retry_after} ms")]
    RateLimited { retry_after: i64 },
    /// 5xx Server Error
    #[error("Server Error ({0}): {1}")]
    ServerError(i32, String),
    /// Other HTTP errors
    #[error("HTTP Error ({0}): {1}")]
    HttpError(i32, String),
    /// Network/request error
    #[error("Request Error: {0}")]
    RequestError(String),
    /// Deserialization error
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
}
