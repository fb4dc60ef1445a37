//! Specification tree: the parsed document with per-node runtime state

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::component::{ComponentType, Instance};
use crate::config::{ComponentConfig, SpecFile, PATH_SEPARATOR};
use crate::hub::EndpointRef;

/// Index of a node in its [`SpecTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One component entry with its resolved runtime state
pub struct ComponentNode {
    local_id: String,
    id: String,
    parent: Option<NodeId>,
    children: IndexMap<String, NodeId>,
    type_name: String,
    inject: IndexMap<String, String>,
    connect: IndexMap<String, String>,
    config: serde_json::Value,

    pub(crate) component_type: Option<Arc<dyn ComponentType>>,
    pub(crate) resolved_injections: IndexMap<String, NodeId>,
    pub(crate) connection_refs: IndexMap<String, Arc<dyn EndpointRef>>,
    pub(crate) instance: Option<Arc<dyn Instance>>,
    pub(crate) started: bool,
}

impl ComponentNode {
    /// Name within the parent's child map
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Full identity: local names from the top joined with `/`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &IndexMap<String, NodeId> {
        &self.children
    }

    /// Declared type name; empty for grouping nodes
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_group(&self) -> bool {
        self.type_name.is_empty()
    }

    /// Declared injections (name -> reference)
    pub fn inject(&self) -> &IndexMap<String, String> {
        &self.inject
    }

    /// Declared connections (name -> endpoint path)
    pub fn connect(&self) -> &IndexMap<String, String> {
        &self.connect
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    pub fn component_type(&self) -> Option<&Arc<dyn ComponentType>> {
        self.component_type.as_ref()
    }

    /// Injection targets resolved during the last resolve
    pub fn resolved_injections(&self) -> &IndexMap<String, NodeId> {
        &self.resolved_injections
    }

    pub fn instance(&self) -> Option<&Arc<dyn Instance>> {
        self.instance.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("inject", &self.inject)
            .field("connect", &self.connect)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("instantiated", &self.instance.is_some())
            .field("started", &self.started)
            .finish()
    }
}

/// The whole component tree.
///
/// Nodes are stored in document pre-order; a parent always precedes its
/// children.
#[derive(Debug)]
pub struct SpecTree {
    name: String,
    version: String,
    description: String,
    nodes: Vec<ComponentNode>,
    roots: IndexMap<String, NodeId>,
}

impl SpecTree {
    /// Build the tree from a parsed document
    pub fn from_spec(spec: &SpecFile) -> Self {
        let mut tree = Self {
            name: spec.name.clone(),
            version: spec.version.clone(),
            description: spec.description.clone(),
            nodes: Vec::with_capacity(spec.component_count()),
            roots: IndexMap::new(),
        };
        for (name, config) in &spec.components {
            let id = tree.insert(name, config, None);
            tree.roots.insert(name.clone(), id);
        }
        tree
    }

    fn insert(&mut self, local_id: &str, config: &ComponentConfig, parent: Option<NodeId>) -> NodeId {
        let id = match parent {
            Some(p) => format!("{}{}{}", self.nodes[p.0].id, PATH_SEPARATOR, local_id),
            None => local_id.to_string(),
        };
        let node_id = NodeId(self.nodes.len());
        self.nodes.push(ComponentNode {
            local_id: local_id.to_string(),
            id,
            parent,
            children: IndexMap::new(),
            type_name: config.type_name.clone(),
            inject: config.inject.clone(),
            connect: config.connect.clone(),
            config: config.config.clone(),
            component_type: None,
            resolved_injections: IndexMap::new(),
            connection_refs: IndexMap::new(),
            instance: None,
            started: false,
        });
        for (name, child) in &config.components {
            let child_id = self.insert(name, child, Some(node_id));
            self.nodes[node_id.0].children.insert(name.clone(), child_id);
        }
        node_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes
    pub fn roots(&self) -> &IndexMap<String, NodeId> {
        &self.roots
    }

    /// Children of a scope; `None` is the root scope
    pub fn children_of(&self, scope: Option<NodeId>) -> &IndexMap<String, NodeId> {
        match scope {
            Some(id) => &self.nodes[id.0].children,
            None => &self.roots,
        }
    }

    pub fn node(&self, id: NodeId) -> &ComponentNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ComponentNode {
        &mut self.nodes[id.0]
    }

    /// All node ids in pre-order
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ComponentNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Look a node up by its full identity
    pub fn find(&self, id: &str) -> Option<NodeId> {
        let mut scope: Option<NodeId> = None;
        for segment in id.split(PATH_SEPARATOR) {
            scope = Some(*self.children_of(scope).get(segment)?);
        }
        scope
    }

    /// Full identity of a node
    pub fn id_of(&self, id: NodeId) -> &str {
        &self.nodes[id.0].id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SpecTree {
        let spec = SpecFile::from_yaml(
            r#"
name: robot
components:
  a:
    type: t
  l1:
    components:
      b0:
        type: t
        inject:
          x: /a
      l2:
        components:
          c:
            type: t
"#,
        )
        .unwrap();
        SpecTree::from_spec(&spec)
    }

    #[test]
    fn test_identities() {
        let tree = sample();
        let ids: Vec<&str> = tree.nodes().map(|(_, n)| n.id()).collect();
        assert_eq!(ids, vec!["a", "l1", "l1/b0", "l1/l2", "l1/l2/c"]);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.name(), "robot");
    }

    #[test]
    fn test_parent_links() {
        let tree = sample();
        let c = tree.find("l1/l2/c").unwrap();
        let l2 = tree.node(c).parent().unwrap();
        assert_eq!(tree.id_of(l2), "l1/l2");
        let l1 = tree.node(l2).parent().unwrap();
        assert_eq!(tree.id_of(l1), "l1");
        assert!(tree.node(l1).parent().is_none());
        assert!(tree.node(l1).is_group());
    }

    #[test]
    fn test_find() {
        let tree = sample();
        assert!(tree.find("l1/b0").is_some());
        assert!(tree.find("b0").is_none());
        assert!(tree.find("l1/missing").is_none());
        assert_eq!(tree.node(tree.find("l1/b0").unwrap()).inject()["x"], "/a");
    }
}
