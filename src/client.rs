//! `LndClient`: one handle for REST calls, history and push subscriptions.
//!
//! Everything a client needs (HTTP client, aggregator, connection registry,
//! event bus) is owned by the instance. Dropping it stops every supervisor.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::api::models::{
    AddInvoiceRequest, AddInvoiceResponse, ApiError, ChannelBalance, Invoice, NodeInfo, Payment,
    WalletBalance,
};
use crate::api::LndRestClient;
use crate::config::{ConfigError, LndConfig};
use crate::history::{HistoryAggregator, HistoryConfig, HistoryError, InvoicesSource, PaymentsSource};
use crate::models::{HistoryFilter, PageResult};
use crate::stream::{
    ConnectRequest, ConnectionInfo, ConnectionRegistry, ConnectionState, EventBus, EventKind,
    HandlerId, ReconnectPolicy, StreamEvent, StreamTransport, SubscriptionKind, TransportError,
    WebSocketTransport,
};
use crate::utils::{EncodingError, PaymentHashInput};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct LndClient {
    rest: Arc<LndRestClient>,
    history: HistoryAggregator,
    registry: ConnectionRegistry,
    ws_base: String,
}

impl LndClient {
    pub fn new(config: &LndConfig) -> Result<Self> {
        Self::with_history_config(config, HistoryConfig::default())
    }

    pub fn with_history_config(config: &LndConfig, history: HistoryConfig) -> Result<Self> {
        let rest = Arc::new(LndRestClient::new(config)?);
        let transport = Arc::new(WebSocketTransport::from_config(config)?);
        info!("LND client for {}", rest.base_url());
        Ok(Self::from_parts(rest, history, transport, config.ws_base_url()))
    }

    /// Assemble from already built collaborators
    pub fn from_parts(
        rest: Arc<LndRestClient>,
        history: HistoryConfig,
        transport: Arc<dyn StreamTransport>,
        ws_base: impl Into<String>,
    ) -> Self {
        let aggregator = HistoryAggregator::with_config(
            Arc::new(PaymentsSource::new(rest.clone())),
            Arc::new(InvoicesSource::new(rest.clone())),
            history,
        );
        Self {
            rest,
            history: aggregator,
            registry: ConnectionRegistry::new(transport, Arc::new(EventBus::new())),
            ws_base: ws_base.into(),
        }
    }

    pub fn rest(&self) -> &LndRestClient {
        &self.rest
    }

    pub async fn get_info(&self) -> Result<NodeInfo> {
        Ok(self.rest.get_info().await?)
    }

    pub async fn channel_balance(&self) -> Result<ChannelBalance> {
        Ok(self.rest.channel_balance().await?)
    }

    pub async fn wallet_balance(&self) -> Result<WalletBalance> {
        Ok(self.rest.wallet_balance().await?)
    }

    pub async fn add_invoice(&self, request: &AddInvoiceRequest) -> Result<AddInvoiceResponse> {
        Ok(self.rest.add_invoice(request).await?)
    }

    pub async fn lookup_invoice(&self, payment_hash: &PaymentHashInput) -> Result<Invoice> {
        Ok(self.rest.lookup_invoice(payment_hash).await?)
    }

    /// Outbound payment by hash; `None` when the node has no such payment
    pub async fn lookup_payment(&self, payment_hash: &PaymentHashInput) -> Result<Option<Payment>> {
        let hash = payment_hash.to_hex()?;
        Ok(self.history.find_payment(&hash).await?)
    }

    pub async fn fetch_history(&self, filter: &HistoryFilter) -> Result<PageResult> {
        Ok(self.history.fetch_history(filter).await?)
    }

    /// Open (or reuse) a push subscription. Returns its canonical URL, which
    /// is the handle for `close`, `status` and `is_active`. Connection
    /// failures are reported as events, never here.
    pub fn subscribe(&self, kind: SubscriptionKind, policy: ReconnectPolicy) -> Result<String> {
        let request = ConnectRequest {
            url: kind.url(&self.ws_base)?,
            headers: self.rest.auth_headers(),
            initial_frame: Some(kind.initial_frame()?),
        };
        Ok(self.registry.open(request, kind.payload(), policy))
    }

    pub fn close(&self, url: &str) -> bool {
        self.registry.close(url)
    }

    pub fn close_all(&self) {
        self.registry.close_all()
    }

    pub fn status(&self, url: &str) -> ConnectionState {
        self.registry.status(url)
    }

    pub fn is_active(&self, url: &str) -> bool {
        self.registry.is_active(url)
    }

    pub fn connection(&self, url: &str) -> Option<ConnectionInfo> {
        self.registry.info(url)
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.registry.events().on(kind, handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.registry.events().off(id)
    }

    pub fn events(&self) -> broadcast::Receiver<StreamEvent> {
        self.registry.events().subscribe()
    }
}
