//! Long-lived push subscriptions with automatic reconnection.
//!
//! [`ConnectionRegistry`] owns one entry per canonical URL, a supervisor task
//! per entry drives connect/backoff (see [`ReconnectPolicy`]), and decoded
//! frames are published on the [`EventBus`].

pub mod events;
pub mod registry;
pub mod scheduler;
pub mod subscription;
pub mod transport;

pub use events::{EventBus, EventKind, HandlerId, StreamError, StreamEvent};
pub use registry::{ConnectionInfo, ConnectionRegistry, ConnectionState};
pub use scheduler::ReconnectPolicy;
pub use subscription::{decode_frame, PayloadKind, SubscriptionKind};
pub use transport::{
    ConnectRequest, Frame, StreamConnection, StreamTransport, TransportError, WebSocketTransport,
};
