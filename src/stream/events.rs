//! Event bus for subscription lifecycle and push updates.
//!
//! Handlers registered with [`EventBus::on`] run synchronously, in
//! registration order, on the task that emitted the event. A panicking handler
//! is logged and skipped; it never unwinds into the connection supervisor.
//! Channel consumers can use [`EventBus::subscribe`] instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

use crate::api::models::{Invoice, Payment};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Invoice,
    PaymentUpdate,
}

/// Failures reported through `error` events
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Socket or handshake failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// A frame that could not be decoded; the connection stays up
    #[error("Malformed message: {0}")]
    Malformed(String),
    /// An `{"error": ...}` frame sent by the node
    #[error("Upstream error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Open {
        url: String,
        reconnected: bool,
    },
    Close {
        url: String,
        reconnecting: bool,
        reason: Option<String>,
    },
    Error {
        url: String,
        error: StreamError,
        reconnecting: bool,
    },
    Invoice {
        url: String,
        invoice: Invoice,
    },
    PaymentUpdate {
        url: String,
        payment: Payment,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Open { .. } => EventKind::Open,
            StreamEvent::Close { .. } => EventKind::Close,
            StreamEvent::Error { .. } => EventKind::Error,
            StreamEvent::Invoice { .. } => EventKind::Invoice,
            StreamEvent::PaymentUpdate { .. } => EventKind::PaymentUpdate,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            StreamEvent::Open { url, .. }
            | StreamEvent::Close { url, .. }
            | StreamEvent::Error { url, .. }
            | StreamEvent::Invoice { url, .. }
            | StreamEvent::PaymentUpdate { url, .. } => url,
        }
    }
}

/// Returned by [`EventBus::on`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

type Handler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

pub struct EventBus {
    handlers: Mutex<Vec<(HandlerId, EventKind, Handler)>>,
    tx: broadcast::Sender<StreamEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            handlers: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Register a handler for one event kind
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(Uuid::new_v4());
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, kind, Arc::new(handler)));
        id
    }

    /// Unregister a handler; returns false if it was not registered
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(hid, _, _)| *hid != id);
        handlers.len() != before
    }

    /// Receiver for every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: StreamEvent) {
        let kind = event.kind();
        // Snapshot so handlers may register or unregister while running
        let matching: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| h.clone())
            .collect();

        for handler in matching {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                error!("{:?} handler panicked for {}", kind, event.url());
            }
        }

        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
