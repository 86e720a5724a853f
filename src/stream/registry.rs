//! Connection registry keyed by canonical subscription URL.
//!
//! The map below is the only shared mutable state of the stream layer. It is
//! written by `open`/`close`/`close_all` and by each connection's own
//! supervisor, which is matched by generation so a stale task can never touch
//! an entry that was closed and reopened under the same URL.
//!
//! `close` only marks an entry `Closing` and signals its supervisor. The
//! supervisor then drops the entry and emits the final `close` event, so every
//! event for one connection comes from a single task, in order.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use super::events::EventBus;
use super::scheduler::{ReconnectPolicy, Supervisor};
use super::subscription::PayloadKind;
use super::transport::{ConnectRequest, StreamTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub url: String,
    pub state: ConnectionState,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

pub(crate) struct ConnectionEntry {
    generation: u64,
    pub state: ConnectionState,
    pub retry_count: u32,
    pub last_error: Option<String>,
    shutdown: watch::Sender<bool>,
}

pub(crate) struct RegistryShared {
    entries: Mutex<HashMap<String, ConnectionEntry>>,
    next_generation: AtomicU64,
    pub events: Arc<EventBus>,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConnectionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` if `url` still belongs to `generation` and is not closing
    pub fn update_if_current<F>(&self, url: &str, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut ConnectionEntry),
    {
        match self.lock().get_mut(url) {
            Some(entry)
                if entry.generation == generation && entry.state != ConnectionState::Closing =>
            {
                f(entry);
                true
            }
            _ => false,
        }
    }

    /// Drop the entry if it belongs to `generation`; returns its last state
    pub fn remove_if_current(&self, url: &str, generation: u64) -> Option<ConnectionState> {
        let mut entries = self.lock();
        match entries.get(url) {
            Some(entry) if entry.generation == generation => {
                entries.remove(url).map(|entry| entry.state)
            }
            _ => None,
        }
    }
}

pub struct ConnectionRegistry {
    shared: Arc<RegistryShared>,
    transport: Arc<dyn StreamTransport>,
}

impl ConnectionRegistry {
    pub fn new(transport: Arc<dyn StreamTransport>, events: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                events,
            }),
            transport,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.shared.events
    }

    /// Start supervising `request.url` unless it is already registered.
    /// Returns the URL, which is the connection's handle.
    pub fn open(&self, request: ConnectRequest, payload: PayloadKind, policy: ReconnectPolicy) -> String {
        let url = request.url.clone();
        let (tx, rx) = watch::channel(false);
        let generation;
        {
            let mut entries = self.shared.lock();
            // a closing entry is replaced; its supervisor is already winding down
            match entries.get(&url) {
                Some(existing) if existing.state != ConnectionState::Closing => {
                    debug!("reusing subscription {} ({})", url, existing.state);
                    return url;
                }
                _ => {}
            }
            generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
            entries.insert(
                url.clone(),
                ConnectionEntry {
                    generation,
                    state: ConnectionState::Connecting,
                    retry_count: 0,
                    last_error: None,
                    shutdown: tx,
                },
            );
        }

        info!("opening subscription {}", url);
        let supervisor = Supervisor {
            url: url.clone(),
            generation,
            request,
            payload,
            policy,
            transport: self.transport.clone(),
            shared: self.shared.clone(),
            shutdown: rx,
        };
        tokio::spawn(supervisor.run());
        url
    }

    /// Close a connection, cancelling any pending retry. The entry reports
    /// `Closing` until its supervisor has stopped and emitted the final
    /// `close` event. Returns false if the URL was not registered.
    pub fn close(&self, url: &str) -> bool {
        let mut entries = self.shared.lock();
        let Some(entry) = entries.get_mut(url) else {
            return false;
        };

        debug!("closing subscription {} ({})", url, entry.state);
        entry.state = ConnectionState::Closing;
        let _ = entry.shutdown.send(true);
        true
    }

    pub fn close_all(&self) {
        for url in self.urls() {
            self.close(&url);
        }
    }

    /// Unknown URLs report `Closed`: entries are removed once closed for good
    pub fn status(&self, url: &str) -> ConnectionState {
        self.shared
            .lock()
            .get(url)
            .map(|entry| entry.state)
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn is_active(&self, url: &str) -> bool {
        self.status(url) == ConnectionState::Open
    }

    pub fn info(&self, url: &str) -> Option<ConnectionInfo> {
        self.shared.lock().get(url).map(|entry| ConnectionInfo {
            url: url.to_string(),
            state: entry.state,
            retry_count: entry.retry_count,
            last_error: entry.last_error.clone(),
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.shared.lock().keys().cloned().collect()
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        for entry in self.shared.lock().values() {
            let _ = entry.shutdown.send(true);
        }
    }
}
