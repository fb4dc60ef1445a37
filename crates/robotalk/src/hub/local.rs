//! In-process hub.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{
    join_path, Connector, Descriptor, Endpoint, EndpointRef, HubError, Message, MessageSink,
    Publication, PublishedComponent, Watcher,
};

#[derive(Default)]
struct HubState {
    endpoints: RwLock<HashMap<String, Endpoint>>,
}

impl HubState {
    fn lookup(&self, path: &str) -> Result<Endpoint, HubError> {
        self.endpoints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| HubError::UnknownEndpoint(path.to_string()))
    }
}

/// A hub living entirely inside the current process.
///
/// Endpoints are addressed by `<component path>/<endpoint name>`. Cloning
/// the hub yields another handle to the same endpoint table.
#[derive(Clone, Default)]
pub struct LocalHub {
    state: Arc<HubState>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every currently published endpoint, sorted
    pub fn published_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state
            .endpoints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Endpoint reference by full path
    pub fn endpoint_ref(&self, path: &str) -> Arc<dyn EndpointRef> {
        Arc::new(LocalEndpointRef {
            state: self.state.clone(),
            path: path.trim_matches('/').to_string(),
        })
    }
}

impl Connector for LocalHub {
    fn describe(&self, component: &str) -> Arc<dyn Descriptor> {
        Arc::new(LocalDescriptor {
            state: self.state.clone(),
            id: component.trim_matches('/').to_string(),
        })
    }

    fn publish(&self, root: PublishedComponent) -> Result<Box<dyn Publication>, HubError> {
        let entries = root.flatten();
        let mut endpoints = self
            .state
            .endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner());

        let mut seen = HashSet::with_capacity(entries.len());
        for (path, _) in &entries {
            if endpoints.contains_key(path) || !seen.insert(path.as_str()) {
                return Err(HubError::AlreadyPublished(path.clone()));
            }
        }

        let mut paths = Vec::with_capacity(entries.len());
        for (path, endpoint) in entries {
            log::debug!("Publishing endpoint {}", path);
            endpoints.insert(path.clone(), endpoint);
            paths.push(path);
        }
        log::info!("Published '{}' with {} endpoints", root.id, paths.len());

        Ok(Box::new(LocalPublication {
            state: self.state.clone(),
            component: root,
            paths,
        }))
    }
}

struct LocalDescriptor {
    state: Arc<HubState>,
    id: String,
}

impl Descriptor for LocalDescriptor {
    fn id(&self) -> &str {
        &self.id
    }

    fn endpoint(&self, name: &str) -> Arc<dyn EndpointRef> {
        Arc::new(LocalEndpointRef {
            state: self.state.clone(),
            path: join_path(&self.id, name),
        })
    }
}

struct LocalEndpointRef {
    state: Arc<HubState>,
    path: String,
}

#[async_trait]
impl EndpointRef for LocalEndpointRef {
    fn path(&self) -> &str {
        &self.path
    }

    fn watch(&self, sink: MessageSink) -> Result<Box<dyn Watcher>, HubError> {
        let endpoint = self.state.lookup(&self.path)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HubError::NoRuntime)?;

        let mut updates = endpoint.subscribe();
        let path = self.path.clone();
        if let Some(mut retained) = endpoint.last() {
            retained.path = path.clone();
            let _ = sink.send(retained);
        }

        let task = runtime.spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(mut message) => {
                        message.path = path.clone();
                        if sink.send(message).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[{}] Watcher lagged, {} messages skipped", path, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Box::new(LocalWatcher { task }))
    }

    async fn consume(&self, mut message: Message) -> Result<(), HubError> {
        let endpoint = self.state.lookup(&self.path)?;
        message.path = endpoint.name().to_string();
        endpoint.deliver(message)
    }
}

struct LocalWatcher {
    task: JoinHandle<()>,
}

impl Watcher for LocalWatcher {
    fn close(self: Box<Self>) {
        self.task.abort();
    }
}

struct LocalPublication {
    state: Arc<HubState>,
    component: PublishedComponent,
    paths: Vec<String>,
}

impl Publication for LocalPublication {
    fn component(&self) -> &PublishedComponent {
        &self.component
    }

    fn close(self: Box<Self>) -> Result<(), HubError> {
        let mut endpoints = self
            .state
            .endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner());
        for path in &self.paths {
            endpoints.remove(path);
        }
        log::info!("Unpublished '{}'", self.component.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn robot_with(endpoints: Vec<Endpoint>) -> PublishedComponent {
        let mut root = PublishedComponent::new("robot");
        let mut led = PublishedComponent::new("led");
        led.endpoints = endpoints;
        root.children.push(led);
        root
    }

    #[tokio::test]
    async fn test_publish_and_watch() {
        let hub = LocalHub::new();
        let state = Endpoint::data_point("on");
        let publication = hub.publish(robot_with(vec![state.clone()])).unwrap();
        assert_eq!(hub.published_paths(), vec!["robot/led/on"]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = hub.describe("robot/led").endpoint("on").watch(tx).unwrap();

        state.update(json!(true));
        let message = rx.recv().await.unwrap();
        assert_eq!(message.path, "robot/led/on");
        assert_eq!(message.payload, json!(true));

        watcher.close();
        publication.close().unwrap();
        assert!(hub.published_paths().is_empty());
    }

    #[tokio::test]
    async fn test_watch_receives_retained_state() {
        let hub = LocalHub::new();
        let state = Endpoint::data_point("on");
        state.update(json!(false));
        let _publication = hub.publish(robot_with(vec![state])).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = hub.endpoint_ref("robot/led/on").watch(tx).unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, json!(false));
    }

    #[tokio::test]
    async fn test_consume_reaches_reactor() {
        let hub = LocalHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reactor = Endpoint::reactor("set", move |msg| {
            sink.lock().unwrap().push(msg);
            Ok(())
        });
        let _publication = hub.publish(robot_with(vec![reactor])).unwrap();

        hub.describe("/robot/led/")
            .endpoint("set")
            .consume(Message::new("ignored", json!({ "on": true })))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "set");
        assert_eq!(seen[0].payload, json!({ "on": true }));
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let hub = LocalHub::new();
        let target = hub.describe("robot/led").endpoint("missing");
        let err = target.consume(Message::new("", json!(null))).await.unwrap_err();
        assert!(matches!(err, HubError::UnknownEndpoint(p) if p == "robot/led/missing"));

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(target.watch(tx).is_err());
    }

    #[test]
    fn test_duplicate_publication_rejected() {
        let hub = LocalHub::new();
        let _first = hub
            .publish(robot_with(vec![Endpoint::data_point("on")]))
            .unwrap();
        let err = hub
            .publish(robot_with(vec![Endpoint::data_point("on")]))
            .err()
            .unwrap();
        assert!(matches!(err, HubError::AlreadyPublished(p) if p == "robot/led/on"));
    }

    #[test]
    fn test_duplicate_endpoint_in_one_tree_rejected() {
        let hub = LocalHub::new();
        let err = hub
            .publish(robot_with(vec![
                Endpoint::data_point("on"),
                Endpoint::data_point("on"),
            ]))
            .err()
            .unwrap();
        assert!(matches!(err, HubError::AlreadyPublished(p) if p == "robot/led/on"));
        assert!(hub.published_paths().is_empty());
    }
}
