//! Name graph - flat namespaces over declared node trees
//!
//! Nodes are declared as a tree linked by composition (a node owns its
//! children) plus references-by-name to other nodes anywhere in the same
//! tree. Building a [`NameGraph`] walks the tree once to register every name
//! and alias and to collect references, then resolves all references in a
//! second pass. This is what allows a node to refer to another node declared
//! later in the tree.

use crate::{Error, Result};
use std::collections::HashMap;

/// Index of a node within one [`NameGraph`], assigned in depth-first preorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Composition contract for anything that can be attached to a [`NameGraph`].
///
/// Implementors are usually cheap borrowed views over a declaration tree.
pub trait GraphNode: Clone {
    /// Primary name of this node, if it can be referenced at all
    fn name(&self) -> Option<String>;

    /// Additional names that resolve to this node
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }

    /// Nodes owned by this node
    fn children(&self) -> Vec<Self>;

    /// Names this node refers to. Resolved links are reported in the same order.
    fn references(&self) -> Vec<String>;
}

/// A node tree with every name registered and every reference resolved
#[derive(Debug, Clone)]
pub struct NameGraph<N> {
    nodes: Vec<N>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    links: Vec<Vec<NodeId>>,
    namespace: HashMap<String, NodeId>,
}

/// Scratch state for the registration pass
struct Binder<N> {
    nodes: Vec<N>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    references: Vec<Vec<String>>,
    namespace: HashMap<String, NodeId>,
    // targets in the order they were first referenced, with occurrence counts
    targets: Vec<String>,
    occurrences: HashMap<String, usize>,
}

impl<N: GraphNode> Binder<N> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            references: Vec::new(),
            namespace: HashMap::new(),
            targets: Vec::new(),
            occurrences: HashMap::new(),
        }
    }

    fn register(&mut self, name: String, id: NodeId) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidName(name));
        }
        if self.namespace.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        self.namespace.insert(name, id);
        Ok(())
    }

    fn bind(&mut self, node: N, parent: Option<NodeId>) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node.clone());
        self.parents.push(parent);
        self.children.push(Vec::new());

        if let Some(name) = node.name() {
            self.register(name, id)?;
        }
        for alias in node.aliases() {
            self.register(alias, id)?;
        }

        let references = node.references();
        for target in &references {
            let count = self.occurrences.entry(target.clone()).or_insert(0);
            if *count == 0 {
                self.targets.push(target.clone());
            }
            *count += 1;
        }
        self.references.push(references);

        for child in node.children() {
            let child_id = self.bind(child, Some(id))?;
            self.children[id.0].push(child_id);
        }
        Ok(id)
    }

    fn resolve(self) -> Result<NameGraph<N>> {
        for target in &self.targets {
            if !self.namespace.contains_key(target) {
                return Err(Error::UnresolvedReference {
                    count: self.occurrences.get(target).copied().unwrap_or(1),
                    target: target.clone(),
                });
            }
        }

        let namespace = self.namespace;
        let links = self
            .references
            .iter()
            .map(|targets| {
                targets
                    .iter()
                    .map(|target| {
                        namespace
                            .get(target)
                            .copied()
                            .ok_or_else(|| Error::UnresolvedReference {
                                count: 1,
                                target: target.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(NameGraph {
            nodes: self.nodes,
            parents: self.parents,
            children: self.children,
            links,
            namespace,
        })
    }
}

impl<N: GraphNode> NameGraph<N> {
    /// Infer a graph from `root` and resolve all of its references.
    ///
    /// Fails on an empty name or alias, a duplicate name or alias, or a
    /// reference that matches nothing. No partial graph is returned.
    /// Building again after editing the declarations starts from an empty
    /// namespace.
    pub fn build(root: N) -> Result<Self> {
        let mut binder = Binder::new();
        binder.bind(root, None)?;
        let graph = binder.resolve()?;
        tracing::trace!(
            nodes = graph.nodes.len(),
            names = graph.namespace.len(),
            "resolved name graph"
        );
        Ok(graph)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in depth-first preorder
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> Option<&N> {
        self.nodes.get(id.0)
    }

    /// Immediate composition owner, `None` for the root
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0).copied().flatten()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolved targets of this node's references, in declaration order
    pub fn links(&self, id: NodeId) -> &[NodeId] {
        self.links.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve a name or alias
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.namespace.get(name).copied()
    }

    pub fn namespace(&self) -> &HashMap<String, NodeId> {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TestNode {
        name: Option<String>,
        aliases: Vec<String>,
        children: Vec<TestNode>,
        refs: Vec<String>,
    }

    impl TestNode {
        fn named(name: &str) -> Self {
            Self {
                name: Some(name.to_string()),
                ..Default::default()
            }
        }

        fn anon() -> Self {
            Self::default()
        }

        fn child(mut self, child: TestNode) -> Self {
            self.children.push(child);
            self
        }

        fn refer(mut self, target: &str) -> Self {
            self.refs.push(target.to_string());
            self
        }

        fn alias(mut self, alias: &str) -> Self {
            self.aliases.push(alias.to_string());
            self
        }
    }

    impl<'a> GraphNode for &'a TestNode {
        fn name(&self) -> Option<String> {
            self.name.clone()
        }

        fn aliases(&self) -> Vec<String> {
            self.aliases.clone()
        }

        fn children(&self) -> Vec<Self> {
            let node: &'a TestNode = self;
            node.children.iter().collect()
        }

        fn references(&self) -> Vec<String> {
            self.refs.clone()
        }
    }

    fn names(graph: &NameGraph<&TestNode>) -> Vec<String> {
        let mut names: Vec<String> = graph.namespace().keys().cloned().collect();
        names.sort();
        names
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let root = TestNode::named(" \t");
        let result = NameGraph::build(&root);
        assert!(matches!(result, Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_anonymous_leaf_has_empty_namespace() {
        let root = TestNode::anon();
        let graph = NameGraph::build(&root).unwrap();
        assert!(graph.namespace().is_empty());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.parent(graph.root()), None);
    }

    #[test]
    fn test_children_are_registered_recursively() {
        let root = TestNode::named("container")
            .child(TestNode::named("list1"))
            .child(TestNode::anon().child(TestNode::named("nested")))
            .child(TestNode::named("list2"));
        let graph = NameGraph::build(&root).unwrap();

        assert_eq!(names(&graph), vec!["container", "list1", "list2", "nested"]);
        let nested = graph.lookup("nested").unwrap();
        let anon = graph.parent(nested).unwrap();
        assert_eq!(graph.parent(anon), Some(graph.root()));
        assert_eq!(graph.children(graph.root()).len(), 3);
    }

    #[test]
    fn test_backward_reference() {
        let root = TestNode::named("parent")
            .child(TestNode::named("child"))
            .child(TestNode::named("container").refer("child"));
        let graph = NameGraph::build(&root).unwrap();

        let container = graph.lookup("container").unwrap();
        assert_eq!(graph.links(container), &[graph.lookup("child").unwrap()]);
    }

    #[test]
    fn test_forward_reference() {
        let root = TestNode::named("parent")
            .refer("child")
            .child(TestNode::named("child"));
        let graph = NameGraph::build(&root).unwrap();

        assert_eq!(
            graph.links(graph.root()),
            &[graph.lookup("child").unwrap()]
        );
    }

    #[test]
    fn test_duplicate_name() {
        let root = TestNode::named("parent")
            .child(TestNode::named("child"))
            .child(TestNode::named("child"));
        let result = NameGraph::build(&root);
        assert!(matches!(result, Err(Error::DuplicateName(name)) if name == "child"));
    }

    #[test]
    fn test_unresolved_reference_reports_count() {
        let root = TestNode::named("parent")
            .child(TestNode::named("child1").refer("child2"))
            .refer("child2");
        let result = NameGraph::build(&root);
        match result {
            Err(Error::UnresolvedReference { count, target }) => {
                assert_eq!(count, 2);
                assert_eq!(target, "child2");
            }
            other => panic!("expected unresolved reference, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_multiple_references_share_one_node() {
        let root = TestNode::named("parent")
            .refer("child")
            .refer("child")
            .child(TestNode::named("child"))
            .child(TestNode::anon().refer("child"));
        let graph = NameGraph::build(&root).unwrap();

        let child = graph.lookup("child").unwrap();
        assert_eq!(graph.links(graph.root()), &[child, child]);
        let anon = graph.children(graph.root())[1];
        assert_eq!(graph.links(anon), &[child]);
    }

    #[test]
    fn test_aliases_resolve_to_same_node() {
        let root = TestNode::named("parent")
            .child(
                TestNode::named("container")
                    .alias("collection")
                    .alias("group"),
            )
            .refer("collection")
            .refer("group");
        let graph = NameGraph::build(&root).unwrap();

        let container = graph.lookup("container").unwrap();
        assert_eq!(graph.links(graph.root()), &[container, container]);
    }

    #[test]
    fn test_alias_collides_with_name() {
        let root = TestNode::named("parent")
            .child(TestNode::named("a"))
            .child(TestNode::named("b").alias("a"));
        assert!(matches!(
            NameGraph::build(&root),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn test_rebuild_starts_from_empty_namespace() {
        let mut root = TestNode::named("parent").child(TestNode::named("child"));
        assert_eq!(NameGraph::build(&root).unwrap().len(), 2);

        root.children.push(TestNode::named("other"));
        let graph = NameGraph::build(&root).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(names(&graph), vec!["child", "other", "parent"]);
    }
}
