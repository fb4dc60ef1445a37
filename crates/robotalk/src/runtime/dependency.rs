//! Dependency graph construction and wave scheduling

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::{AggregateError, EngineError};
use super::tree::{NodeId, SpecTree};

/// How the scheduler groups ready nodes into waves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavePolicy {
    /// A wave holds only the nodes ready at the start of the pass, so waves
    /// are topological depth levels
    #[default]
    Level,
    /// A node whose last dependency is readied during a pass joins that same
    /// wave, listed after the dependency
    Cascade,
}

impl FromStr for WavePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "level" => Ok(WavePolicy::Level),
            "cascade" => Ok(WavePolicy::Cascade),
            other => Err(format!(
                "Invalid wave policy '{}'. Expected 'level' or 'cascade'",
                other
            )),
        }
    }
}

/// Directed "depends on" / "activates" edges between nodes
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    depends: Vec<IndexSet<NodeId>>,
    activates: Vec<IndexSet<NodeId>>,
}

impl DependencyGraph {
    /// Build edges for every node of the tree.
    ///
    /// Resolves each node's injections (recording the targets on the node)
    /// and makes every parent depend on each of its direct children.
    /// Unresolved injections are collected; every node is still visited.
    pub fn build(tree: &mut SpecTree) -> Result<Self, AggregateError> {
        let mut graph = Self {
            depends: vec![IndexSet::new(); tree.len()],
            activates: vec![IndexSet::new(); tree.len()],
        };
        let mut errors = AggregateError::new();

        for id in tree.ids() {
            let mut resolved = indexmap::IndexMap::new();
            let node = tree.node(id);
            for (name, reference) in node.inject() {
                match tree.resolve_ref(id, reference) {
                    Some(target) => {
                        graph.add_edge(id, target);
                        resolved.insert(name.clone(), target);
                    }
                    None => errors.push(EngineError::UnresolvedReference {
                        node: node.id().to_string(),
                        name: name.clone(),
                        reference: reference.clone(),
                    }),
                }
            }
            let children: Vec<NodeId> = node.children().values().copied().collect();
            for child in children {
                graph.add_edge(id, child);
            }
            tree.node_mut(id).resolved_injections = resolved;
        }

        errors.into_result().map(|_| graph)
    }

    fn add_edge(&mut self, dependent: NodeId, dependency: NodeId) {
        self.depends[dependent.index()].insert(dependency);
        self.activates[dependency.index()].insert(dependent);
    }

    /// Nodes `id` must wait for
    pub fn depends_on(&self, id: NodeId) -> &IndexSet<NodeId> {
        &self.depends[id.index()]
    }

    /// Nodes waiting on `id`
    pub fn dependents(&self, id: NodeId) -> &IndexSet<NodeId> {
        &self.activates[id.index()]
    }

    /// Group all nodes into waves.
    ///
    /// Fails with one [`EngineError::CyclicDependency`] per node that can
    /// never become ready.
    pub fn schedule(&self, tree: &SpecTree, policy: WavePolicy) -> Result<InitOrder, AggregateError> {
        let mut depends = self.depends.clone();
        let mut pending: IndexSet<NodeId> = tree.ids().collect();
        let mut waves = Vec::new();

        while !pending.is_empty() {
            let snapshot: Vec<NodeId> = pending.iter().copied().collect();
            let mut ready = Vec::new();

            match policy {
                WavePolicy::Level => {
                    ready.extend(
                        snapshot
                            .iter()
                            .copied()
                            .filter(|id| depends[id.index()].is_empty()),
                    );
                    for id in &ready {
                        pending.shift_remove(id);
                        for dependent in &self.activates[id.index()] {
                            depends[dependent.index()].shift_remove(id);
                        }
                    }
                }
                WavePolicy::Cascade => {
                    for id in snapshot {
                        self.cascade(id, &mut depends, &mut pending, &mut ready);
                    }
                }
            }

            if ready.is_empty() {
                let mut errors = AggregateError::new();
                for id in pending {
                    errors.push(EngineError::CyclicDependency {
                        node: tree.id_of(id).to_string(),
                    });
                }
                return Err(errors);
            }

            log::debug!(
                "Wave {}: {}",
                waves.len(),
                ready
                    .iter()
                    .map(|id| tree.id_of(*id))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            waves.push(ready);
        }

        Ok(InitOrder { waves })
    }

    fn cascade(
        &self,
        start: NodeId,
        depends: &mut [IndexSet<NodeId>],
        pending: &mut IndexSet<NodeId>,
        ready: &mut Vec<NodeId>,
    ) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !depends[id.index()].is_empty() || !pending.shift_remove(&id) {
                continue;
            }
            ready.push(id);
            for dependent in self.activates[id.index()].iter().rev() {
                depends[dependent.index()].shift_remove(&id);
                stack.push(*dependent);
            }
        }
    }
}

/// Ordered waves of nodes; every node's dependencies live in earlier waves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOrder {
    waves: Vec<Vec<NodeId>>,
}

impl InitOrder {
    pub fn waves(&self) -> &[Vec<NodeId>] {
        &self.waves
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Index of the wave containing `id`
    pub fn wave_of(&self, id: NodeId) -> Option<usize> {
        self.waves.iter().position(|wave| wave.contains(&id))
    }

    /// Nodes in activation order
    pub fn launch_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.waves.iter().flat_map(|wave| wave.iter().copied())
    }

    /// Nodes in teardown order (reverse of activation order)
    pub fn shutdown_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.waves
            .iter()
            .rev()
            .flat_map(|wave| wave.iter().rev().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecFile;

    fn tree(yaml: &str) -> SpecTree {
        SpecTree::from_spec(&SpecFile::from_yaml(yaml).unwrap())
    }

    fn waves_of(tree: &SpecTree, order: &InitOrder) -> Vec<Vec<String>> {
        order
            .waves()
            .iter()
            .map(|wave| wave.iter().map(|id| tree.id_of(*id).to_string()).collect())
            .collect()
    }

    fn schedule(yaml: &str, policy: WavePolicy) -> (SpecTree, Result<InitOrder, AggregateError>) {
        let mut tree = tree(yaml);
        let graph = DependencyGraph::build(&mut tree).unwrap();
        let order = graph.schedule(&tree, policy);
        (tree, order)
    }

    #[test]
    fn test_simple_injection_order() {
        let (tree, order) = schedule(
            r#"
components:
  a:
    type: T
  b:
    type: U
    inject:
      x: a
"#,
            WavePolicy::Level,
        );
        let order = order.unwrap();
        assert_eq!(waves_of(&tree, &order), vec![vec!["a"], vec!["b"]]);

        let shutdown: Vec<&str> = order.shutdown_order().map(|id| tree.id_of(id)).collect();
        assert_eq!(shutdown, vec!["b", "a"]);
    }

    #[test]
    fn test_parent_waits_for_children() {
        let (tree, order) = schedule(
            r#"
components:
  l1:
    components:
      a0:
        type: T
      a1:
        type: T
  a:
    type: T
"#,
            WavePolicy::Level,
        );
        let order = order.unwrap();
        assert_eq!(
            waves_of(&tree, &order),
            vec![vec!["l1/a0", "l1/a1", "a"], vec!["l1"]]
        );
    }

    #[test]
    fn test_diamond_dependency() {
        let (tree, order) = schedule(
            r#"
components:
  d:
    type: T
    inject: { left: b, right: c }
  b:
    type: T
    inject: { base: a }
  c:
    type: T
    inject: { base: a }
  a:
    type: T
"#,
            WavePolicy::Level,
        );
        let order = order.unwrap();
        assert_eq!(
            waves_of(&tree, &order),
            vec![vec!["a"], vec!["b", "c"], vec!["d"]]
        );
    }

    #[test]
    fn test_level_policy_respects_every_edge() {
        let (tree, order) = schedule(
            r#"
components:
  top:
    type: T
    inject: { dep: /g/inner/leaf }
  g:
    components:
      inner:
        components:
          leaf:
            type: T
          sibling:
            type: T
            inject: { l: leaf }
      other:
        type: T
        inject: { t: ../lone }
  lone:
    type: T
"#,
            WavePolicy::Level,
        );
        let order = order.unwrap();
        let mut tree = tree;
        let graph = DependencyGraph::build(&mut tree).unwrap();

        let all: Vec<NodeId> = order.launch_order().collect();
        assert_eq!(all.len(), tree.len());
        for id in tree.ids() {
            assert_eq!(all.iter().filter(|n| **n == id).count(), 1);
            let wave = order.wave_of(id).unwrap();
            for dep in graph.depends_on(id) {
                assert!(
                    order.wave_of(*dep).unwrap() < wave,
                    "{} must come after {}",
                    tree.id_of(id),
                    tree.id_of(*dep)
                );
            }
        }
    }

    #[test]
    fn test_cascade_policy_joins_same_wave() {
        let (tree, order) = schedule(
            r#"
components:
  a:
    type: T
  b:
    type: U
    inject:
      x: a
  l1:
    components:
      a0:
        type: T
"#,
            WavePolicy::Cascade,
        );
        let order = order.unwrap();
        assert_eq!(order.len(), 1);
        let wave = &waves_of(&tree, &order)[0];
        let pos = |name: &str| wave.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("l1/a0") < pos("l1"));
    }

    #[test]
    fn test_cyclic_dependency_detection() {
        let (_, order) = schedule(
            r#"
components:
  a:
    type: T
    inject: { peer: b }
  b:
    type: T
    inject: { peer: a }
  c:
    type: T
"#,
            WavePolicy::Level,
        );
        let err = order.unwrap_err();
        let nodes = err.nodes();
        assert_eq!(nodes, vec!["a", "b"]);
        assert!(err
            .iter()
            .all(|e| matches!(e, EngineError::CyclicDependency { .. })));
    }

    #[test]
    fn test_self_and_ancestor_injection_are_cycles() {
        let (_, order) = schedule(
            r#"
components:
  solo:
    type: T
    inject: { me: solo }
"#,
            WavePolicy::Level,
        );
        assert_eq!(order.unwrap_err().nodes(), vec!["solo"]);

        let (_, order) = schedule(
            r#"
components:
  g:
    type: T
    components:
      child:
        type: T
        inject: { up: .. }
"#,
            WavePolicy::Cascade,
        );
        assert_eq!(order.unwrap_err().nodes(), vec!["g", "g/child"]);
    }

    #[test]
    fn test_unresolved_injections_are_collected() {
        let mut tree = tree(
            r#"
components:
  a:
    type: T
    inject: { x: nowhere }
  g:
    components:
      b:
        type: T
        inject: { y: ../../too/far, z: ../a }
"#,
        );
        let err = DependencyGraph::build(&mut tree).unwrap_err();
        assert_eq!(err.len(), 2);
        assert!(matches!(
            &err.errors()[0],
            EngineError::UnresolvedReference { node, name, reference }
                if node == "a" && name == "x" && reference == "nowhere"
        ));
        assert!(matches!(
            &err.errors()[1],
            EngineError::UnresolvedReference { node, name, .. } if node == "g/b" && name == "y"
        ));
    }

    #[test]
    fn test_resolved_injections_recorded() {
        let mut tree = tree(
            r#"
components:
  a:
    type: T
  g:
    components:
      b:
        type: T
        inject: { up: ../a }
"#,
        );
        let graph = DependencyGraph::build(&mut tree).unwrap();
        let b = tree.find("g/b").unwrap();
        let a = tree.find("a").unwrap();
        assert_eq!(tree.node(b).resolved_injections()["up"], a);
        assert!(graph.dependents(a).contains(&b));
        assert!(graph.depends_on(tree.find("g").unwrap()).contains(&b));
    }

    #[test]
    fn test_empty_tree() {
        let (_, order) = schedule("name: empty", WavePolicy::Level);
        assert!(order.unwrap().is_empty());
    }

    #[test]
    fn test_wave_policy_from_str() {
        assert_eq!("level".parse::<WavePolicy>(), Ok(WavePolicy::Level));
        assert_eq!("Cascade".parse::<WavePolicy>(), Ok(WavePolicy::Cascade));
        assert!("bogus".parse::<WavePolicy>().is_err());
    }
}
