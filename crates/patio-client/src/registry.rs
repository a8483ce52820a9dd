//! Event dispatch registry — typed fan-out of inbound events, plus the
//! outbound send path.
//!
//! Handlers are keyed by [`EventKind`] and run in registration order.  They
//! receive the consumer's context (`&mut C`) rather than the registry, so
//! the handler table can't be modified while a dispatch is iterating it.
//! The registry itself holds no business state.

use std::collections::HashMap;

use patio_proto::codec::{self, Decoded};
use patio_proto::protocol::{EventKind, InboundEvent, OutboundCommand};
use serde_json::Value;
use tracing::{debug, warn};

use crate::transport::{Connector, Inbound, Transport, TransportEvent, WsConnector};

pub type Handler<C> = Box<dyn FnMut(&mut C, &InboundEvent)>;
pub type ConnectionHandler<C> = Box<dyn FnMut(&mut C, bool)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Anything outbound commands can be sent through.
pub trait Outbound {
    /// Returns `false` when the command was dropped (not connected).
    fn send_command(&mut self, command: &OutboundCommand) -> bool;
}

pub struct Registry<C, K: Connector = WsConnector> {
    transport: Transport<K>,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler<C>)>>,
    connection_handlers: Vec<(SubscriptionId, ConnectionHandler<C>)>,
    next_id: u64,
}

impl<C, K: Connector> Registry<C, K> {
    pub fn new(transport: Transport<K>) -> Self {
        Self {
            transport,
            handlers: HashMap::new(),
            connection_handlers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn transport(&self) -> &Transport<K> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<K> {
        &mut self.transport
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// Register `handler` for `kind`.  Several handlers per kind are allowed.
    pub fn on(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&mut C, &InboundEvent) + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Register a connection-state handler.  It is called right away with
    /// the current state, then on every open/close.
    pub fn on_connection(
        &mut self,
        ctx: &mut C,
        mut handler: impl FnMut(&mut C, bool) + 'static,
    ) -> SubscriptionId {
        handler(ctx, self.transport.is_open());
        let id = self.next_id();
        self.connection_handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler.  Returns `false` if `id` was not registered.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        for list in self.handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                return true;
            }
        }
        if let Some(pos) = self.connection_handlers.iter().position(|(h, _)| *h == id) {
            self.connection_handlers.remove(pos);
            return true;
        }
        false
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Encode and send.  Silently dropped while the transport is not open.
    pub fn emit(&mut self, event: &str, payload: &Value) -> bool {
        let sent = self.transport.send(codec::encode(event, payload));
        if sent {
            debug!("Registry: emit {} {}", event, payload);
        } else {
            debug!("Registry: not connected, dropped {}", event);
        }
        sent
    }

    /// Invoke every handler for the event's kind.  Returns how many ran.
    pub fn dispatch(&mut self, ctx: &mut C, event: &InboundEvent) -> usize {
        let Some(list) = self.handlers.get_mut(&event.kind()) else {
            return 0;
        };
        for (_, handler) in list.iter_mut() {
            handler(ctx, event);
        }
        list.len()
    }

    /// Decode one raw frame and dispatch it.  Non-event frames, unknown
    /// events and malformed frames are dropped; malformed ones are logged.
    pub fn handle_frame(&mut self, ctx: &mut C, frame: &str) -> usize {
        let envelope = match codec::decode(frame) {
            Ok(Decoded::Event(env)) => env,
            Ok(Decoded::NotAnEvent) => return 0,
            Err(e) => {
                warn!("Registry: dropping frame: {}", e);
                return 0;
            }
        };
        match InboundEvent::from_envelope(&envelope) {
            Ok(Some(event)) => {
                debug!("Registry: dispatch {}", envelope.event);
                self.dispatch(ctx, &event)
            }
            Ok(None) => {
                debug!("Registry: no handlers for {}", envelope.event);
                0
            }
            Err(e) => {
                warn!("Registry: dropping frame: {}", e);
                0
            }
        }
    }

    /// Feed one transport event through the manager and on to handlers.
    pub fn handle_transport_event(&mut self, ctx: &mut C, event: TransportEvent) {
        match self.transport.handle_event(event) {
            Some(Inbound::Frame(text)) => {
                self.handle_frame(ctx, &text);
            }
            Some(Inbound::Connection(open)) => {
                for (_, handler) in self.connection_handlers.iter_mut() {
                    handler(ctx, open);
                }
            }
            None => {}
        }
    }
}

impl<C, K: Connector> Outbound for Registry<C, K> {
    fn send_command(&mut self, command: &OutboundCommand) -> bool {
        self.emit(command.event_name(), &command.payload())
    }
}
