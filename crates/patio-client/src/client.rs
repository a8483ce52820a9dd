//! Client — composes transport, registry and engine into one owner.
//!
//! There is exactly one task that mutates state: whoever drives
//! [`Client::next_event`] / [`Client::handle`].  Socket tasks only produce
//! [`TransportEvent`]s; user gestures call [`Client::act`].  Nothing is
//! shared, so nothing is locked.

use std::time::Duration;

use patio_proto::config::Config;
use tokio::sync::mpsc;

use crate::engine::{Engine, UiState};
use crate::registry::{Outbound, Registry};
use crate::transport::{Connector, Transport, TransportEvent, WsConnector};

pub struct Client<K: Connector = WsConnector> {
    registry: Registry<Engine, K>,
    engine: Engine,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Client<WsConnector> {
    /// Build a websocket client from the config file settings.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config.socket_url()?;
        let engine = Engine::new(
            config.audio.max_gain,
            Duration::from_secs(config.ui.toast_secs),
        );
        Ok(Self::new(url, WsConnector::new(config.connect_timeout()), engine))
    }
}

impl<K: Connector> Client<K> {
    pub fn new(url: impl Into<String>, connector: K, mut engine: Engine) -> Self {
        let (transport, events) = Transport::new(url, connector);
        let mut registry = Registry::new(transport);
        engine.register(&mut registry);
        Self {
            registry,
            engine,
            events,
        }
    }

    pub fn connect(&mut self) {
        self.registry.transport_mut().connect();
    }

    pub fn reconnect(&mut self) {
        self.registry.transport_mut().reconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.registry.transport().is_open()
    }

    pub fn transport(&self) -> &Transport<K> {
        self.registry.transport()
    }

    pub fn transport_mut(&mut self) -> &mut Transport<K> {
        self.registry.transport_mut()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn state(&self) -> &UiState {
        self.engine.state()
    }

    /// Wait for the next socket event.  `None` only if every sender is gone,
    /// which cannot happen while the client holds its transport.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`Client::next_event`].
    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    /// Apply one socket event: connection changes and inbound frames reach
    /// the engine through the registry.
    pub fn handle(&mut self, event: TransportEvent) {
        self.registry.handle_transport_event(&mut self.engine, event);
    }

    /// Run a user intent against the engine with the registry as the
    /// outbound path.
    pub fn act<R>(&mut self, intent: impl FnOnce(&mut Engine, &mut dyn Outbound) -> R) -> R {
        intent(&mut self.engine, &mut self.registry)
    }
}
