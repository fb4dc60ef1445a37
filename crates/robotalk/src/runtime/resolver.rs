//! Path-like references between nodes.
//!
//! * `/a/b` starts at the root scope.
//! * `x` or `x/y` starts at the referencing node's parent, so plain names
//!   address siblings.
//! * `..` climbs one scope. Climbing out of a top-level group lands in the
//!   root scope; climbing out of the root scope fails.

use super::tree::{NodeId, SpecTree};
use crate::config::{PARENT_SEGMENT, PATH_SEPARATOR};

impl SpecTree {
    /// Resolve `reference` as seen from node `from`.
    pub fn resolve_ref(&self, from: NodeId, reference: &str) -> Option<NodeId> {
        if reference.is_empty() {
            return None;
        }

        let (mut scope, path) = match reference.strip_prefix(PATH_SEPARATOR) {
            Some(rest) => (None, rest),
            None => (self.node(from).parent(), reference),
        };
        // "/a/" and "a/" address the same node as "/a" and "a"
        let path = path.strip_suffix(PATH_SEPARATOR).unwrap_or(path);
        if path.is_empty() {
            return None;
        }

        let mut target = None;
        for segment in path.split(PATH_SEPARATOR) {
            if segment == PARENT_SEGMENT {
                let current = scope?;
                scope = self.node(current).parent();
                target = scope;
                continue;
            }
            let child = *self.children_of(scope).get(segment)?;
            scope = Some(child);
            target = Some(child);
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecFile;

    fn tree() -> SpecTree {
        let spec = SpecFile::from_yaml(
            r#"
components:
  a:
    type: t
  x:
    type: t
  l1:
    components:
      a:
        type: t
      b:
        type: t
      l2:
        components:
          c:
            type: t
"#,
        )
        .unwrap();
        SpecTree::from_spec(&spec)
    }

    fn resolve(tree: &SpecTree, from: &str, reference: &str) -> Option<String> {
        let from = tree.find(from).unwrap();
        tree.resolve_ref(from, reference)
            .map(|id| tree.id_of(id).to_string())
    }

    #[test]
    fn test_sibling_lookup() {
        let tree = tree();
        assert_eq!(resolve(&tree, "a", "x").as_deref(), Some("x"));
        assert_eq!(resolve(&tree, "l1/b", "a").as_deref(), Some("l1/a"));
        assert_eq!(resolve(&tree, "l1/b", "l2/c").as_deref(), Some("l1/l2/c"));
        assert_eq!(resolve(&tree, "l1/b", "missing"), None);
    }

    #[test]
    fn test_absolute_lookup_ignores_position() {
        let tree = tree();
        for from in ["a", "l1", "l1/b", "l1/l2/c"] {
            assert_eq!(resolve(&tree, from, "/a").as_deref(), Some("a"), "from {}", from);
            assert_eq!(
                resolve(&tree, from, "/l1/l2/c").as_deref(),
                Some("l1/l2/c"),
                "from {}",
                from
            );
        }
    }

    #[test]
    fn test_parent_climb_from_top_level_fails() {
        let tree = tree();
        assert_eq!(resolve(&tree, "a", "../x"), None);
        assert_eq!(resolve(&tree, "l1", "../a"), None);
    }

    #[test]
    fn test_parent_climb_one_level_deep_reaches_root_scope() {
        let tree = tree();
        assert_eq!(resolve(&tree, "l1/b", "../a").as_deref(), Some("a"));
        assert_eq!(resolve(&tree, "l1/b", "../x").as_deref(), Some("x"));
    }

    #[test]
    fn test_parent_climb_two_levels() {
        let tree = tree();
        assert_eq!(resolve(&tree, "l1/l2/c", "../a").as_deref(), Some("l1/a"));
        assert_eq!(resolve(&tree, "l1/l2/c", "../../x").as_deref(), Some("x"));
        assert_eq!(resolve(&tree, "l1/l2/c", "../../../x"), None);
    }

    #[test]
    fn test_parent_segment_alone_names_the_scope() {
        let tree = tree();
        assert_eq!(resolve(&tree, "l1/l2/c", "..").as_deref(), Some("l1"));
        // the root scope is not a node
        assert_eq!(resolve(&tree, "l1/b", ".."), None);
    }

    #[test]
    fn test_degenerate_references() {
        let tree = tree();
        assert_eq!(resolve(&tree, "l1/b", ""), None);
        assert_eq!(resolve(&tree, "l1/b", "/"), None);
        assert_eq!(resolve(&tree, "l1/b", "a//b"), None);
        assert_eq!(resolve(&tree, "l1/b", "a/").as_deref(), Some("l1/a"));
        assert_eq!(resolve(&tree, "l1/b", "/.."), None);
    }
}
