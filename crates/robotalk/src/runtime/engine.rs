//! Engine - resolves the component tree and drives instance lifecycles

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::component::{
    ComponentContext, ComponentError, Injections, Instance, RequirementKind, TypeResolver,
};
use crate::config::SpecFile;
use crate::hub::{Connector, Publication, PublishedComponent};
use crate::runtime::dependency::{DependencyGraph, InitOrder, WavePolicy};
use crate::runtime::error::{AggregateError, EngineError};
use crate::runtime::tree::{NodeId, SpecTree};

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// How ready nodes are grouped into waves
    pub wave_policy: WavePolicy,
    /// Name of the published root; defaults to the document name
    pub root_name: Option<String>,
}

/// Owns a component tree and its live instances.
///
/// Phases run in order: [`resolve`](Engine::resolve) builds the graph and
/// the initialization order, [`connect`](Engine::connect) instantiates and
/// starts every node wave by wave, [`disconnect`](Engine::disconnect) tears
/// everything down in reverse.
pub struct Engine {
    config: EngineConfig,
    tree: SpecTree,
    types: Arc<dyn TypeResolver>,
    graph: Option<DependencyGraph>,
    order: Option<InitOrder>,
    publication: Option<Box<dyn Publication>>,
}

impl Engine {
    pub fn new(tree: SpecTree, types: Arc<dyn TypeResolver>, config: EngineConfig) -> Self {
        Self {
            config,
            tree,
            types,
            graph: None,
            order: None,
            publication: None,
        }
    }

    pub fn from_spec(spec: &SpecFile, types: Arc<dyn TypeResolver>, config: EngineConfig) -> Self {
        Self::new(SpecTree::from_spec(spec), types, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &SpecTree {
        &self.tree
    }

    pub fn is_resolved(&self) -> bool {
        self.order.is_some()
    }

    /// Initialization order computed by the last successful resolve
    pub fn init_order(&self) -> Option<&InitOrder> {
        self.order.as_ref()
    }

    /// Edges computed by the last successful resolve
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    /// Name the tree is published under
    pub fn root_name(&self) -> &str {
        self.config
            .root_name
            .as_deref()
            .unwrap_or_else(|| self.tree.name())
    }

    /// Live instance of the node with full identity `id`
    pub fn instance(&self, id: &str) -> Option<Arc<dyn Instance>> {
        let node = self.tree.find(id)?;
        self.tree.node(node).instance().cloned()
    }

    /// Identities of started nodes, in start order
    pub fn started(&self) -> Vec<&str> {
        self.order
            .iter()
            .flat_map(|order| order.launch_order())
            .filter(|id| self.tree.node(*id).is_started())
            .map(|id| self.tree.id_of(id))
            .collect()
    }

    pub fn is_published(&self) -> bool {
        self.publication.is_some()
    }

    /// Resolve references and types, validate manifests and compute the
    /// initialization order.
    ///
    /// Refused while instances are live. Reference errors end the phase
    /// before types are looked at.
    pub fn resolve(&mut self) -> Result<(), AggregateError> {
        if self.is_connected() {
            return Err(EngineError::Connected.into());
        }
        self.graph = None;
        self.order = None;

        let graph = DependencyGraph::build(&mut self.tree)?;
        let mut type_errors = AggregateError::new();
        self.resolve_types(&mut type_errors);
        type_errors.into_result()?;

        let order = graph.schedule(&self.tree, self.config.wave_policy)?;

        log::info!(
            "Resolved {} components in {} waves",
            self.tree.len(),
            order.len()
        );
        self.graph = Some(graph);
        self.order = Some(order);
        Ok(())
    }

    fn resolve_types(&mut self, errors: &mut AggregateError) {
        let ids: Vec<NodeId> = self.tree.ids().collect();
        for id in ids {
            let node = self.tree.node(id);
            if node.is_group() {
                self.tree.node_mut(id).component_type = None;
                continue;
            }

            let component_type = match self.types.resolve_type(node.type_name()) {
                Ok(t) => t,
                Err(source) => {
                    errors.push(EngineError::UnknownType {
                        node: node.id().to_string(),
                        source,
                    });
                    self.tree.node_mut(id).component_type = None;
                    continue;
                }
            };

            for requirement in component_type.manifest().requirements() {
                if requirement.optional {
                    continue;
                }
                let (declared, kind) = match requirement.kind {
                    RequirementKind::Component => {
                        (node.inject().contains_key(&requirement.name), "injection")
                    }
                    RequirementKind::Endpoint => {
                        (node.connect().contains_key(&requirement.name), "connection")
                    }
                };
                if !declared {
                    errors.push(EngineError::MissingInjection {
                        node: node.id().to_string(),
                        type_name: node.type_name().to_string(),
                        kind,
                        name: requirement.name.clone(),
                    });
                }
            }

            self.tree.node_mut(id).component_type = Some(component_type);
        }
    }

    /// Describe what `connect` would do, without instantiating anything
    pub fn plan(&self) -> Result<InitPlan, EngineError> {
        let order = self.order.as_ref().ok_or(EngineError::NotResolved)?;
        let waves = order
            .waves()
            .iter()
            .map(|wave| wave.iter().map(|id| self.plan_node(*id)).collect())
            .collect();
        Ok(InitPlan {
            name: self.root_name().to_string(),
            waves,
        })
    }

    fn plan_node(&self, id: NodeId) -> InitPlanNode {
        let node = self.tree.node(id);
        InitPlanNode {
            id: node.id().to_string(),
            type_name: (!node.is_group()).then(|| node.type_name().to_string()),
            injections: node
                .resolved_injections()
                .iter()
                .map(|(name, target)| (name.clone(), self.tree.id_of(*target).to_string()))
                .collect(),
            connections: node
                .connect()
                .iter()
                .map(|(name, path)| (name.clone(), path.clone()))
                .collect(),
        }
    }

    /// Instantiate and start every node, then publish the tree.
    ///
    /// Resolves first when needed. Every node is attempted; failures are
    /// collected and returned together, and the tree is only published when
    /// nothing failed.
    pub async fn connect(&mut self, connector: &dyn Connector) -> Result<(), AggregateError> {
        if self.is_connected() {
            log::warn!("Engine already connected, disconnecting first");
            if let Err(errors) = self.disconnect().await {
                log::warn!("Teardown before reconnect: {}", errors);
            }
        }
        if !self.is_resolved() {
            self.resolve()?;
        }
        self.resolve_connections(connector)?;

        let order: Vec<NodeId> = match &self.order {
            Some(order) => order.launch_order().collect(),
            None => return Err(EngineError::NotResolved.into()),
        };

        log::info!("Connecting {} components...", order.len());
        let mut errors = AggregateError::new();

        for id in order {
            let instance = match self.instantiate(id) {
                Ok(Some(instance)) => instance,
                Ok(None) => continue,
                Err(e) => {
                    log::error!("{}", e);
                    errors.push(e);
                    continue;
                }
            };
            self.tree.node_mut(id).instance = Some(instance.clone());

            let Some(lifecycle) = instance.lifecycle() else {
                log::debug!("[{}] No lifecycle, not started", self.tree.id_of(id));
                continue;
            };
            log::info!("[{}] Start", self.tree.id_of(id));
            match lifecycle.start().await {
                Ok(()) => self.tree.node_mut(id).started = true,
                Err(source) => {
                    let e = EngineError::StartFailure {
                        node: self.tree.id_of(id).to_string(),
                        source,
                    };
                    log::error!("{}", e);
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            let root = self.published_root();
            match connector.publish(root) {
                Ok(publication) => self.publication = Some(publication),
                Err(e) => errors.push(EngineError::Publish(e)),
            }
        }

        errors.into_result()?;
        log::info!("All components connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.publication.is_some() || self.tree.nodes().any(|(_, n)| n.instance().is_some())
    }

    fn resolve_connections(&mut self, connector: &dyn Connector) -> Result<(), AggregateError> {
        let mut errors = AggregateError::new();
        let ids: Vec<NodeId> = self.tree.ids().collect();
        for id in ids {
            let node = self.tree.node(id);
            let mut refs = IndexMap::new();
            for (name, path) in node.connect() {
                match split_endpoint_path(path) {
                    Some((component, endpoint)) => {
                        refs.insert(name.clone(), connector.describe(component).endpoint(endpoint));
                    }
                    None => errors.push(EngineError::UnresolvedEndpoint {
                        node: node.id().to_string(),
                        name: name.clone(),
                        path: path.clone(),
                    }),
                }
            }
            self.tree.node_mut(id).connection_refs = refs;
        }
        errors.into_result()
    }

    /// Build the instance of one node; `None` for grouping nodes
    fn instantiate(&self, id: NodeId) -> Result<Option<Arc<dyn Instance>>, EngineError> {
        let node = self.tree.node(id);
        let Some(component_type) = node.component_type() else {
            return Ok(None);
        };
        log::info!("[{}] Initialize ({})", node.id(), node.type_name());

        let failure = |source: ComponentError| EngineError::InstantiationFailure {
            node: node.id().to_string(),
            source,
        };

        let mut injections = Injections::new();
        for (name, target) in node.resolved_injections() {
            if let Some(instance) = self.tree.node(*target).instance() {
                injections.insert_component(name.clone(), instance.clone());
            }
        }
        for (name, endpoint) in &node.connection_refs {
            injections.insert_endpoint(name.clone(), endpoint.clone());
        }

        for requirement in component_type.manifest().requirements() {
            match requirement.kind {
                RequirementKind::Component => match injections.instance(&requirement.name) {
                    Ok(instance) => {
                        if !requirement.capability.is_satisfied_by(instance.as_ref()) {
                            return Err(failure(ComponentError::TypeMismatch {
                                name: requirement.name.clone(),
                                expected: requirement.capability.to_string(),
                            }));
                        }
                    }
                    Err(e) if !requirement.optional => return Err(failure(e)),
                    Err(_) => {}
                },
                RequirementKind::Endpoint => {
                    if let Err(e) = injections.endpoint(&requirement.name) {
                        if !requirement.optional {
                            return Err(failure(e));
                        }
                    }
                }
            }
        }

        let ctx = ComponentContext {
            id: node.id(),
            local_id: node.local_id(),
            type_name: node.type_name(),
            config: node.config(),
            injections: &injections,
        };
        component_type.create(&ctx).map(Some).map_err(failure)
    }

    fn published_root(&self) -> PublishedComponent {
        let mut root = PublishedComponent::new(self.root_name());
        root.children = self
            .tree
            .roots()
            .values()
            .map(|id| self.published_node(*id))
            .collect();
        root
    }

    fn published_node(&self, id: NodeId) -> PublishedComponent {
        let node = self.tree.node(id);
        let mut published = PublishedComponent::new(node.local_id());
        if let Some(instance) = node.instance() {
            published.endpoints = instance.endpoints();
        }
        published.children = node
            .children()
            .values()
            .map(|child| self.published_node(*child))
            .collect();
        published
    }

    /// Stop started nodes in reverse order, drop every instance and
    /// unpublish the tree.
    ///
    /// Stop failures are collected; teardown always runs to the end.
    pub async fn disconnect(&mut self) -> Result<(), AggregateError> {
        let order: Vec<NodeId> = match &self.order {
            Some(order) => order.shutdown_order().collect(),
            None => self.tree.ids().rev().collect(),
        };

        log::info!("Disconnecting components...");
        let mut errors = AggregateError::new();

        for id in order {
            let node = self.tree.node_mut(id);
            let instance = node.instance.take();
            let started = std::mem::replace(&mut node.started, false);

            let Some(instance) = instance else {
                continue;
            };
            if !started {
                continue;
            }
            if let Some(lifecycle) = instance.lifecycle() {
                log::info!("[{}] Stop", self.tree.id_of(id));
                if let Err(source) = lifecycle.stop().await {
                    let e = EngineError::StopFailure {
                        node: self.tree.id_of(id).to_string(),
                        source,
                    };
                    log::error!("{}", e);
                    errors.push(e);
                }
            }
        }

        if let Some(publication) = self.publication.take() {
            if let Err(e) = publication.close() {
                errors.push(EngineError::Unpublish(e));
            }
        }

        errors.into_result()?;
        log::info!("All components disconnected");
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tree", &self.tree)
            .field("order", &self.order)
            .field("published", &self.publication.is_some())
            .finish()
    }
}

/// Split `component/path/endpoint` at its last separator.
///
/// A path without a separator names an endpoint at the hub root.
fn split_endpoint_path(path: &str) -> Option<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((_, "")) => None,
        Some((component, endpoint)) => Some((component, endpoint)),
        None if path.is_empty() => None,
        None => Some(("", path)),
    }
}

/// Initialization plan for dry-run mode
#[derive(Debug)]
pub struct InitPlan {
    /// Root name the tree would be published under
    pub name: String,
    /// Nodes wave by wave
    pub waves: Vec<Vec<InitPlanNode>>,
}

/// A node in the initialization plan
#[derive(Debug)]
pub struct InitPlanNode {
    pub id: String,
    /// `None` for grouping nodes
    pub type_name: Option<String>,
    /// Injection name and the identity of the node it resolves to
    pub injections: Vec<(String, String)>,
    /// Connection name and endpoint path
    pub connections: Vec<(String, String)>,
}

impl InitPlan {
    pub fn node_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }
}

impl fmt::Display for InitPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.name.is_empty() {
            "Init Plan".to_string()
        } else {
            format!("Init Plan: {}", self.name)
        };
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;

        for (i, wave) in self.waves.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Wave {}:", i + 1)?;
            for node in wave {
                match &node.type_name {
                    Some(type_name) => writeln!(f, "  {} [{}]", node.id, type_name)?,
                    None => writeln!(f, "  {} (group)", node.id)?,
                }
                for (name, target) in &node.injections {
                    writeln!(f, "     inject {} -> {}", name, target)?;
                }
                for (name, path) in &node.connections {
                    writeln!(f, "     connect {} -> {}", name, path)?;
                }
            }
        }

        Ok(())
    }
}
