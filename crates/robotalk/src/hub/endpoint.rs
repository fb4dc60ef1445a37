//! Messages and the endpoints instances expose.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use super::HubError;

const UPDATE_CAPACITY: usize = 64;

/// A message travelling through the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Path of the endpoint the message belongs to
    pub path: String,
    /// Message body
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(path: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            payload,
        }
    }
}

type ReactorFn = dyn Fn(Message) -> Result<(), HubError> + Send + Sync;

/// Kind of endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Publishes state updates to watchers
    DataPoint,
    /// Consumes messages sent to it
    Reactor,
}

/// A named pub/sub channel exposed by a live instance.
///
/// Cloning is cheap; clones share the same channel, so an instance keeps one
/// clone to publish updates and hands another out from
/// [`Instance::endpoints`](crate::component::Instance::endpoints).
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    kind: EndpointKind,
    updates: broadcast::Sender<Message>,
    retained: Arc<RwLock<Option<Message>>>,
    reactor: Option<Arc<ReactorFn>>,
}

impl Endpoint {
    /// An endpoint that publishes state; the last update is retained for
    /// new watchers
    pub fn data_point(name: impl Into<String>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            name: name.into(),
            kind: EndpointKind::DataPoint,
            updates,
            retained: Arc::new(RwLock::new(None)),
            reactor: None,
        }
    }

    /// An endpoint that handles messages consumed through the hub
    pub fn reactor<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Message) -> Result<(), HubError> + Send + Sync + 'static,
    {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            name: name.into(),
            kind: EndpointKind::Reactor,
            updates,
            retained: Arc::new(RwLock::new(None)),
            reactor: Some(Arc::new(handler)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Publish a new state value to every watcher
    pub fn update(&self, payload: serde_json::Value) {
        self.publish(Message::new(self.name.clone(), payload));
    }

    /// Last published state, if any
    pub fn last(&self) -> Option<Message> {
        self.retained
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Subscribe to updates
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.updates.subscribe()
    }

    /// Deliver a message sent to this endpoint.
    ///
    /// Reactors hand it to their handler; data points treat it as a state
    /// update.
    pub fn deliver(&self, message: Message) -> Result<(), HubError> {
        match &self.reactor {
            Some(handler) => handler(message),
            None => {
                self.publish(message);
                Ok(())
            }
        }
    }

    fn publish(&self, message: Message) {
        *self.retained.write().unwrap_or_else(|e| e.into_inner()) = Some(message.clone());
        // no watchers is not an error
        let _ = self.updates.send(message);
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
