use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{
    AddInvoiceRequest, AddInvoiceResponse, ApiError, ChannelBalance, ErrorResponse, Invoice,
    ListInvoicesRequest, ListInvoicesResponse, ListPaymentsRequest, ListPaymentsResponse,
    NodeInfo, WalletBalance,
};
use crate::config::LndConfig;
use crate::utils::{extract_clean_error, PaymentHashInput, RateLimiter};

/// Header carrying the hex macaroon on every request and WebSocket handshake
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

/// REST client for a single LND node
pub struct LndRestClient {
    http_client: HttpClient,
    macaroon_hex: String,
    base_url: String,
    limiter: Option<RateLimiter>,
}

impl LndRestClient {
    /// Create a client from node configuration
    pub fn new(config: &LndConfig) -> Result<Self, ApiError> {
        let mut builder = HttpClient::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        let pem = config
            .tls_cert_pem()
            .map_err(|e| ApiError::RequestError(e.to_string()))?;
        if let Some(pem) = pem {
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ApiError::RequestError(format!("Invalid TLS certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let http_client = builder
            .build()
            .map_err(|e| ApiError::RequestError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            macaroon_hex: config.macaroon_hex.clone(),
            base_url: config.rest_base_url(),
            limiter: config.requests_per_second.map(RateLimiter::new),
        })
    }

    /// Create a client with custom base URL and default HTTP settings (for testing)
    pub fn with_base_url(macaroon_hex: String, base_url: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            macaroon_hex,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authentication headers shared by REST calls and stream handshakes
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![(MACAROON_HEADER.to_string(), self.macaroon_hex.clone())]
    }

    /// Create default headers with the macaroon
    fn create_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let macaroon = HeaderValue::from_str(&self.macaroon_hex)
            .map_err(|e| ApiError::RequestError(format!("Failed to create macaroon header: {}", e)))?;
        headers.insert(HeaderName::from_static("grpc-metadata-macaroon"), macaroon);

        Ok(headers)
    }

    /// Parse error response based on HTTP status code
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ApiError {
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();

        // Gateway errors carry {"code", "message"}; fall back to the raw body
        let message = serde_json::from_str::<ErrorResponse>(&body_text)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .map(|m| extract_clean_error(&m))
            .unwrap_or(body_text);

        match status_code {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            429 => {
                warn!("Rate limited by node: {}", message);
                ApiError::RateLimited { retry_after: 1000 }
            }
            500..=599 => {
                warn!("Server error {}: {}", status_code, message);
                ApiError::ServerError(status_code as i32, message)
            }
            _ => ApiError::HttpError(status_code as i32, message),
        }
    }

    /// Attach auth headers, honour the rate limit, send and decode
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let response = request
            .headers(self.create_headers()?)
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        debug!("{} -> {}", what, response.status());

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::DeserializationError(format!("Failed to parse {}: {}", what, e)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /v1/getinfo
    pub async fn get_info(&self) -> Result<NodeInfo, ApiError> {
        self.execute(self.http_client.get(self.url("/v1/getinfo")), "getinfo")
            .await
    }

    /// GET /v1/balance/channels
    pub async fn channel_balance(&self) -> Result<ChannelBalance, ApiError> {
        self.execute(
            self.http_client.get(self.url("/v1/balance/channels")),
            "channel balance",
        )
        .await
    }

    /// GET /v1/balance/blockchain
    pub async fn wallet_balance(&self) -> Result<WalletBalance, ApiError> {
        self.execute(
            self.http_client.get(self.url("/v1/balance/blockchain")),
            "wallet balance",
        )
        .await
    }

    /// POST /v1/invoices
    ///
    /// Creates a new invoice. The returned `r_hash` is base64 encoded.
    pub async fn add_invoice(
        &self,
        request: &AddInvoiceRequest,
    ) -> Result<AddInvoiceResponse, ApiError> {
        self.execute(
            self.http_client.post(self.url("/v1/invoices")).json(request),
            "add invoice",
        )
        .await
    }

    /// GET /v2/invoices/lookup
    pub async fn lookup_invoice(&self, payment_hash: &PaymentHashInput) -> Result<Invoice, ApiError> {
        let hash = payment_hash
            .to_url_safe_base64()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        self.execute(
            self.http_client
                .get(self.url("/v2/invoices/lookup"))
                .query(&[("payment_hash", hash)]),
            "invoice lookup",
        )
        .await
    }

    /// GET /v1/payments
    pub async fn list_payments(
        &self,
        request: &ListPaymentsRequest,
    ) -> Result<ListPaymentsResponse, ApiError> {
        self.execute(
            self.http_client.get(self.url("/v1/payments")).query(request),
            "payments",
        )
        .await
    }

    /// GET /v1/invoices
    pub async fn list_invoices(
        &self,
        request: &ListInvoicesRequest,
    ) -> Result<ListInvoicesResponse, ApiError> {
        self.execute(
            self.http_client.get(self.url("/v1/invoices")).query(request),
            "invoices",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MACAROON: &str = "0201036c6e64";

    async fn client_for(server: &MockServer) -> LndRestClient {
        LndRestClient::with_base_url(MACAROON.to_string(), server.uri())
    }

    #[tokio::test]
    async fn test_get_info_sends_macaroon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/getinfo"))
            .and(header("grpc-metadata-macaroon", MACAROON))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "alias": "alice",
                "identity_pubkey": "02abc",
                "block_height": 800000,
                "synced_to_chain": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client_for(&server).await.get_info().await.unwrap();
        assert_eq!(info.alias, "alice");
        assert_eq!(info.block_height, 800_000);
        assert!(info.synced_to_chain);
    }

    #[tokio::test]
    async fn test_list_payments_query_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments"))
            .and(query_param("index_offset", "7"))
            .and(query_param("max_payments", "100"))
            .and(query_param("reversed", "true"))
            .and(query_param("creation_date_start", "1600000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payments": [{"payment_hash": "aa", "value_sat": "10", "status": "SUCCEEDED"}],
                "first_index_offset": "3",
                "last_index_offset": "6"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ListPaymentsRequest {
            index_offset: "7".to_string(),
            max_payments: 100,
            reversed: true,
            include_incomplete: true,
            creation_date_start: Some(1_600_000_000),
            creation_date_end: None,
        };
        let resp = client_for(&server).await.list_payments(&request).await.unwrap();
        assert_eq!(resp.payments.len(), 1);
        assert_eq!(resp.payments[0].value_sat, 10);
        assert_eq!(resp.first_index_offset, 3);
    }

    #[tokio::test]
    async fn test_add_invoice_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoices"))
            .and(body_json(serde_json::json!({"memo": "coffee", "value": "2500"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "r_hash": "q80=",
                "payment_request": "lnbc25u1...",
                "add_index": "12"
            })))
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .await
            .add_invoice(&AddInvoiceRequest::new(2500, "coffee"))
            .await
            .unwrap();
        assert_eq!(resp.add_index, 12);
        assert_eq!(resp.payment_request, "lnbc25u1...");
    }

    #[tokio::test]
    async fn test_error_body_message_is_cleaned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/invoices/lookup"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": 5,
                "message": "rpc error: code = NotFound desc = unable to locate invoice"
            })))
            .mount(&server)
            .await;

        let hash = PaymentHashInput::Hex("11".repeat(32));
        let err = client_for(&server).await.lookup_invoice(&hash).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound("unable to locate invoice".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/balance/blockchain"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.wallet_balance().await.unwrap_err();
        assert_eq!(err, ApiError::ServerError(503, "unavailable".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_rejects_bad_hash_without_request() {
        let server = MockServer::start().await;
        let hash = PaymentHashInput::Hex("zz".to_string());
        let err = client_for(&server).await.lookup_invoice(&hash).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
