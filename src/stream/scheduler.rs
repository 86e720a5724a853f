//! Per-connection supervisor: connect, pump frames, back off, retry.
//!
//! One supervisor task runs per registry entry. It only mutates the entry it
//! was spawned for (matched by generation), and stops as soon as the entry's
//! shutdown signal fires or the entry is marked closing. It is the only
//! emitter of events for its connection, including the final `close`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::events::{StreamError, StreamEvent};
use super::registry::{ConnectionState, RegistryShared};
use super::subscription::{decode_frame, PayloadKind};
use super::transport::{ConnectRequest, Frame, StreamConnection, StreamTransport};

pub(crate) const CLOSED_BY_CLIENT: &str = "closed by client";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub auto_reconnect: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 10% random delay on top of each backoff step
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            auto_reconnect: false,
            ..Self::default()
        }
    }

    /// `base_delay * 2^retry_count`, capped at `max_delay`
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter {
            let extra = rand::thread_rng().gen_range(0.0..0.1);
            delay + delay.mul_f64(extra)
        } else {
            delay
        }
    }
}

/// Why a live or attempted connection ended
enum Disconnect {
    Closed(Option<String>),
    Failed(String),
}

enum PumpExit {
    Shutdown,
    Ended(Disconnect),
}

/// Resolves once shutdown is requested or the registry entry is dropped
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub(crate) struct Supervisor {
    pub url: String,
    pub generation: u64,
    pub request: ConnectRequest,
    pub payload: PayloadKind,
    pub policy: ReconnectPolicy,
    pub transport: Arc<dyn StreamTransport>,
    pub shared: Arc<RegistryShared>,
    pub shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub async fn run(mut self) {
        let mut retry_count = 0u32;
        let mut reconnected = false;

        loop {
            if !self.set_state(ConnectionState::Connecting, retry_count, None) {
                return self.closed_by_client();
            }

            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return self.closed_by_client(),
                result = self.transport.connect(&self.request) => result,
            };

            let disconnect = match connected {
                Ok(mut conn) => {
                    retry_count = 0;
                    if !self.set_state(ConnectionState::Open, 0, None) {
                        conn.close().await;
                        return self.closed_by_client();
                    }
                    info!("subscription open: {} (reconnected: {})", self.url, reconnected);
                    self.shared.events.emit(StreamEvent::Open {
                        url: self.url.clone(),
                        reconnected,
                    });

                    match self.pump(conn.as_mut()).await {
                        PumpExit::Shutdown => {
                            conn.close().await;
                            return self.closed_by_client();
                        }
                        PumpExit::Ended(disconnect) => disconnect,
                    }
                }
                Err(e) => Disconnect::Failed(e.to_string()),
            };

            if !self.policy.auto_reconnect || retry_count >= self.policy.max_retries {
                self.finish(disconnect, retry_count);
                return;
            }

            let delay = self.policy.delay_for(retry_count);
            retry_count += 1;
            let last_error = match &disconnect {
                Disconnect::Failed(msg) => Some(msg.clone()),
                Disconnect::Closed(_) => None,
            };
            if !self.set_state(ConnectionState::Reconnecting, retry_count, last_error) {
                return self.closed_by_client();
            }
            warn!(
                "subscription {} dropped, retry {}/{} in {}ms",
                self.url,
                retry_count,
                self.policy.max_retries,
                delay.as_millis()
            );
            self.shared.events.emit(self.disconnect_event(disconnect, true));

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return self.closed_by_client(),
                _ = tokio::time::sleep(delay) => {}
            }
            reconnected = true;
        }
    }

    async fn pump(&mut self, conn: &mut dyn StreamConnection) -> PumpExit {
        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return PumpExit::Shutdown,
                frame = conn.next_frame() => frame,
            };

            match frame {
                Some(Ok(Frame::Text(text))) => match decode_frame(self.payload, &self.url, &text) {
                    Ok(event) => self.shared.events.emit(event),
                    Err(error) => {
                        debug!("dropping frame on {}: {}", self.url, error);
                        self.shared.events.emit(StreamEvent::Error {
                            url: self.url.clone(),
                            error,
                            reconnecting: false,
                        });
                    }
                },
                Some(Ok(Frame::Close(reason))) => return PumpExit::Ended(Disconnect::Closed(reason)),
                Some(Err(e)) => return PumpExit::Ended(Disconnect::Failed(e.to_string())),
                None => return PumpExit::Ended(Disconnect::Closed(None)),
            }
        }
    }

    /// Terminal transition: drop the entry, then report
    fn finish(&self, disconnect: Disconnect, retry_count: u32) {
        match self.shared.remove_if_current(&self.url, self.generation) {
            Some(ConnectionState::Closing) | None => {
                info!("closed subscription {}", self.url);
                self.emit_client_close();
                return;
            }
            Some(_) => {}
        }
        if self.policy.auto_reconnect {
            error!(
                "subscription {} closed after {} retries",
                self.url, retry_count
            );
        } else {
            info!("subscription {} closed", self.url);
        }
        self.shared.events.emit(self.disconnect_event(disconnect, false));
    }

    /// Stop after `close`: drop the entry unless it was already replaced
    fn closed_by_client(&self) {
        self.shared.remove_if_current(&self.url, self.generation);
        info!("closed subscription {}", self.url);
        self.emit_client_close();
    }

    fn emit_client_close(&self) {
        self.shared.events.emit(StreamEvent::Close {
            url: self.url.clone(),
            reconnecting: false,
            reason: Some(CLOSED_BY_CLIENT.to_string()),
        });
    }

    fn disconnect_event(&self, disconnect: Disconnect, reconnecting: bool) -> StreamEvent {
        let url = self.url.clone();
        match disconnect {
            Disconnect::Closed(reason) => StreamEvent::Close {
                url,
                reconnecting,
                reason,
            },
            Disconnect::Failed(msg) => StreamEvent::Error {
                url,
                error: StreamError::Transport(msg),
                reconnecting,
            },
        }
    }

    fn set_state(&self, state: ConnectionState, retry_count: u32, last_error: Option<String>) -> bool {
        self.shared.update_if_current(&self.url, self.generation, |entry| {
            entry.state = state;
            entry.retry_count = retry_count;
            if last_error.is_some() {
                entry.last_error = last_error;
            }
        })
    }
}
