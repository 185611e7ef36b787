use std::fmt;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Whether a description groups others or stands for a runnable test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionKind {
    Suite,
    Test,
}

/// A node of the legacy host's suite/test graph. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Description {
    pub kind: DescriptionKind,
    /// Suite name, or the class/group label of a test.
    pub class_name: String,
    /// Leaf name of a test; `None` for suites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl Description {
    pub fn suite(name: &str, unique_id: Option<&str>) -> Self {
        Self {
            kind: DescriptionKind::Suite,
            class_name: name.to_owned(),
            method_name: None,
            unique_id: unique_id.map(str::to_owned),
        }
    }

    pub fn test(class_name: &str, name: &str, unique_id: &str) -> Self {
        Self {
            kind: DescriptionKind::Test,
            class_name: class_name.to_owned(),
            method_name: Some(name.to_owned()),
            unique_id: Some(unique_id.to_owned()),
        }
    }

    pub fn is_suite(&self) -> bool {
        self.kind == DescriptionKind::Suite
    }

    pub fn is_test(&self) -> bool {
        self.kind == DescriptionKind::Test
    }

    /// `method(class)` for tests, the bare name for suites.
    pub fn display_name(&self) -> String {
        match &self.method_name {
            Some(method) => format!("{method}({})", self.class_name),
            None => self.class_name.clone(),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Errors from wiring the description graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("no description with index {0}")]
    UnknownNode(usize),
    #[error("description \"{0}\" already has a parent")]
    AlreadyAttached(String),
    #[error("attaching \"{child}\" below \"{parent}\" would create a cycle")]
    Cycle { parent: String, child: String },
}

/// The legacy description graph, backed by a petgraph `DiGraph` with edges
/// pointing from parent to child.
#[derive(Debug, Clone, Default)]
pub struct DescriptionGraph {
    graph: DiGraph<Description, ()>,
}

impl DescriptionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_suite(&mut self, name: &str, unique_id: Option<&str>) -> NodeIndex {
        self.graph.add_node(Description::suite(name, unique_id))
    }

    pub fn create_test(&mut self, class_name: &str, name: &str, unique_id: &str) -> NodeIndex {
        self.graph
            .add_node(Description::test(class_name, name, unique_id))
    }

    /// Attach `child` below `parent`. A description has at most one parent.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] for unknown indices, a child that is already
    /// attached, or an edge that would close a cycle.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) -> Result<(), GraphError> {
        let parent_name = self.require(parent)?.display_name();
        let child_name = self.require(child)?.display_name();
        if self.parent(child).is_some() {
            return Err(GraphError::AlreadyAttached(child_name));
        }
        if has_path_connecting(&self.graph, child, parent, None) {
            return Err(GraphError::Cycle {
                parent: parent_name,
                child: child_name,
            });
        }
        self.graph.add_edge(parent, child, ());
        Ok(())
    }

    pub fn get(&self, index: NodeIndex) -> Option<&Description> {
        self.graph.node_weight(index)
    }

    /// Direct children in attachment order.
    pub fn children(&self, index: NodeIndex) -> Vec<NodeIndex> {
        // petgraph walks outgoing edges newest first.
        let mut kids: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        kids.reverse();
        kids
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .next()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// An owned copy of the subtree rooted at `index`.
    pub fn snapshot(&self, index: NodeIndex) -> Option<DescriptionTree> {
        let description = self.get(index)?.clone();
        let children = self
            .children(index)
            .into_iter()
            .filter_map(|child| self.snapshot(child))
            .collect();
        Some(DescriptionTree {
            description,
            children,
        })
    }

    fn require(&self, index: NodeIndex) -> Result<&Description, GraphError> {
        self.get(index)
            .ok_or(GraphError::UnknownNode(index.index()))
    }
}

/// An owned, recursive view of part of the description graph, as handed to
/// the legacy host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionTree {
    pub description: Description,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DescriptionTree>,
}

impl DescriptionTree {
    /// Number of test descriptions in this subtree, including the root.
    pub fn test_count(&self) -> usize {
        let own = usize::from(self.description.is_test());
        own + self.children.iter().map(Self::test_count).sum::<usize>()
    }

    /// All test descriptions, depth-first.
    pub fn tests(&self) -> Vec<&Description> {
        let mut out = Vec::new();
        self.collect_tests(&mut out);
        out
    }

    fn collect_tests<'a>(&'a self, out: &mut Vec<&'a Description>) {
        if self.description.is_test() {
            out.push(&self.description);
        }
        for child in &self.children {
            child.collect_tests(out);
        }
    }

    pub fn find_test(&self, class_name: &str, method_name: &str) -> Option<&Description> {
        self.tests().into_iter().find(|d| {
            d.class_name == class_name && d.method_name.as_deref() == Some(method_name)
        })
    }
}
