//! Pub/sub hub boundary.
//!
//! The engine talks to the hub only through [`Connector`]: it turns
//! `connect` paths into [`EndpointRef`] handles before instantiation and
//! publishes the whole component tree as one [`PublishedComponent`] after
//! everything is up. [`LocalHub`] is the in-process implementation used by
//! the CLI and the tests.

mod endpoint;
mod local;

pub use endpoint::{Endpoint, EndpointKind, Message};
pub use local::LocalHub;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving side of a watch
pub type MessageSink = mpsc::UnboundedSender<Message>;

/// Entry point into a hub
pub trait Connector: Send + Sync {
    /// Describe a (possibly remote) component by path
    fn describe(&self, component: &str) -> Arc<dyn Descriptor>;

    /// Publish a component tree; endpoints stay addressable until the
    /// publication is closed
    fn publish(&self, root: PublishedComponent) -> Result<Box<dyn Publication>, HubError>;
}

/// Handle to a component known to the hub
pub trait Descriptor: Send + Sync {
    fn id(&self) -> &str;
    fn endpoint(&self, name: &str) -> Arc<dyn EndpointRef>;
}

/// Handle to a single endpoint, resolved lazily on use
#[async_trait]
pub trait EndpointRef: Send + Sync {
    /// Full hub path of the endpoint
    fn path(&self) -> &str;

    /// Forward every message of the endpoint to `sink` until the watcher is
    /// closed
    fn watch(&self, sink: MessageSink) -> Result<Box<dyn Watcher>, HubError>;

    /// Send a message to the endpoint
    async fn consume(&self, message: Message) -> Result<(), HubError>;
}

/// An active subscription
pub trait Watcher: Send {
    fn close(self: Box<Self>);
}

/// A published component tree
pub trait Publication: Send + Sync {
    fn component(&self) -> &PublishedComponent;
    fn close(self: Box<Self>) -> Result<(), HubError>;
}

/// Snapshot of a component and its descendants as seen by the hub
#[derive(Debug, Clone, Default)]
pub struct PublishedComponent {
    pub id: String,
    pub endpoints: Vec<Endpoint>,
    pub children: Vec<PublishedComponent>,
}

impl PublishedComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Every endpoint in the tree with its full path
    pub fn flatten(&self) -> Vec<(String, Endpoint)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, Endpoint)>) {
        let base = join_path(prefix, &self.id);
        for endpoint in &self.endpoints {
            out.push((join_path(&base, endpoint.name()), endpoint.clone()));
        }
        for child in &self.children {
            child.flatten_into(&base, out);
        }
    }
}

/// Join two path parts with `/`, skipping empty parts
pub fn join_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_matches('/');
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, name),
    }
}

/// Errors that can occur in hub operations
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("endpoint '{0}' is already published")]
    AlreadyPublished(String),

    #[error("message rejected by '{path}': {reason}")]
    Rejected { path: String, reason: String },

    #[error("watching requires a running tokio runtime")]
    NoRuntime,
}
