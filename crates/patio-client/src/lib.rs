//! Realtime synchronization layer for the patio player UI.
//!
//! ```text
//!  socket task ──TransportEvent──▶ Transport ──frame──▶ codec ──▶ Registry
//!                                                                   │
//!                      Outbound ◀── intents ◀── UI        Engine ◀──┘
//! ```

pub mod client;
pub mod engine;
pub mod flows;
pub mod intent;
pub mod registry;
pub mod toast;
pub mod transport;

pub use client::Client;
pub use engine::{CreateRequest, Engine, UiState};
pub use registry::{Outbound, Registry};
pub use transport::{Connector, Transport, TransportEvent, WsConnector};
