//! Duplex stream transport used by connection supervisors.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::LndConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Everything needed to (re)establish one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub initial_frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close(Option<String>),
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<Box<dyn StreamConnection>, TransportError>;
}

#[async_trait]
pub trait StreamConnection: Send {
    /// Next data or close frame; `None` once the peer is gone
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self);
}

/// WebSocket transport over tokio-tungstenite
pub struct WebSocketTransport {
    connector: Option<Connector>,
}

impl WebSocketTransport {
    /// Plain transport using the system trust store
    pub fn new() -> Self {
        Self { connector: None }
    }

    /// Honour the node's certificate settings
    pub fn from_config(config: &LndConfig) -> Result<Self, TransportError> {
        let pem = config
            .tls_cert_pem()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if pem.is_none() && !config.accept_invalid_certs {
            return Ok(Self::new());
        }

        let mut builder = native_tls::TlsConnector::builder();
        if let Some(pem) = pem {
            let cert = native_tls::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::InvalidRequest(format!("Invalid TLS certificate: {}", e)))?;
            builder.add_root_certificate(cert);
        }
        if config.accept_invalid_certs {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let tls = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            connector: Some(Connector::NativeTls(tls)),
        })
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            ws_request.headers_mut().insert(name, value);
        }

        let (mut stream, _response) =
            connect_async_tls_with_config(ws_request, None, false, self.connector.clone())
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("websocket connected: {}", request.url);

        if let Some(frame) = &request.initial_frame {
            stream
                .send(Message::Text(frame.clone()))
                .await
                .map_err(|e| TransportError::Stream(e.to_string()))?;
        }

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Binary(bytes)) => Frame::Text(String::from_utf8_lossy(&bytes).into_owned()),
                Ok(Message::Close(close)) => Frame::Close(close.map(|c| c.reason.into_owned())),
                // pings are answered by tungstenite on the next read
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Stream(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("websocket close: {}", e);
        }
    }
}
