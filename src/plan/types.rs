use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique-id segment prefixes of nodes the engine generates at run time.
const DYNAMIC_SEGMENT_PREFIXES: [&str; 5] = [
    "[test-template-invocation",
    "[dynamic-test",
    "[dynamic-container",
    "[test-factory",
    "[test-template",
];

/// What kind of node an identifier describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TestKind {
    /// A grouping node known at discovery time (engine, class, nested class).
    Container,
    /// An ordinary test known at discovery time.
    Test,
    /// A node that belongs to a runtime-generated chain: test templates,
    /// factories and their invocations. `leaf` is false for the
    /// intermediate containers of such a chain.
    Dynamic { leaf: bool },
}

impl TestKind {
    /// Classify a node from its unique id and whether the engine reports it
    /// as executable.
    pub fn infer(unique_id: &str, is_test: bool) -> Self {
        let segment = unique_id
            .rsplit_once('/')
            .map_or(unique_id, |(_, last)| last);
        if DYNAMIC_SEGMENT_PREFIXES
            .iter()
            .any(|prefix| segment.starts_with(prefix))
        {
            Self::Dynamic { leaf: is_test }
        } else if is_test {
            Self::Test
        } else {
            Self::Container
        }
    }

    /// Whether the legacy host sees this node as a runnable test.
    pub fn is_test(self) -> bool {
        matches!(self, Self::Test | Self::Dynamic { leaf: true })
    }

    pub fn is_container(self) -> bool {
        !self.is_test()
    }

    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Test => write!(f, "test"),
            Self::Dynamic { leaf: false } => write!(f, "dynamic_container"),
            Self::Dynamic { leaf: true } => write!(f, "dynamic_test"),
        }
    }
}

impl FromStr for TestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(Self::Container),
            "test" => Ok(Self::Test),
            "dynamic_container" => Ok(Self::Dynamic { leaf: false }),
            "dynamic_test" => Ok(Self::Dynamic { leaf: true }),
            other => Err(format!(
                "unknown test kind '{other}' (expected: container, test, dynamic_container, dynamic_test)"
            )),
        }
    }
}

impl TryFrom<String> for TestKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TestKind> for String {
    fn from(kind: TestKind) -> Self {
        kind.to_string()
    }
}

/// Where a node comes from in the code under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestSource {
    Class {
        class_name: String,
    },
    Method {
        class_name: String,
        method_name: String,
        /// Comma-separated parameter type names, empty for no parameters.
        #[serde(default)]
        parameter_types: String,
    },
}

/// A node of the engine's discovered tree. Assigned by the engine, never
/// created by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentifier {
    pub unique_id: String,
    pub display_name: String,
    /// Engine-provided name in the flat `method(params)[n]` style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_reporting_name: Option<String>,
    pub kind: TestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TestSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TestIdentifier {
    pub fn new(unique_id: &str, display_name: &str, kind: TestKind) -> Self {
        Self {
            unique_id: unique_id.to_owned(),
            display_name: display_name.to_owned(),
            legacy_reporting_name: None,
            kind,
            source: None,
            parent_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_owned());
        self
    }

    pub fn with_source(mut self, source: TestSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_legacy_name(mut self, name: &str) -> Self {
        self.legacy_reporting_name = Some(name.to_owned());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_owned()).collect();
        self
    }

    pub fn is_test(&self) -> bool {
        self.kind.is_test()
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind.is_dynamic()
    }

    /// The name used by the legacy host's method filtering.
    pub fn legacy_name(&self) -> &str {
        self.legacy_reporting_name
            .as_deref()
            .unwrap_or(&self.display_name)
    }
}

/// Errors from assembling a test plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("identifier \"{0}\" is already part of the plan")]
    DuplicateIdentifier(String),
    #[error("identifier \"{id}\" references unknown parent \"{parent}\"")]
    UnknownParent { id: String, parent: String },
}

/// The engine's discovered tree: every identifier reachable from the roots,
/// with lookups by id and from id to direct children. Grows when the engine
/// registers dynamic nodes during execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestPlan {
    roots: Vec<String>,
    identifiers: HashMap<String, TestIdentifier>,
    children: HashMap<String, Vec<String>>,
}

impl TestPlan {
    /// An empty plan (no roots).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from identifiers listed parent-before-child.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] on a repeated id or a parent that was not
    /// listed earlier.
    pub fn from_identifiers(
        identifiers: impl IntoIterator<Item = TestIdentifier>,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new();
        for identifier in identifiers {
            plan.add(identifier)?;
        }
        Ok(plan)
    }

    /// Add one identifier. Without a parent id it becomes a root.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] on a repeated id or an unknown parent.
    pub fn add(&mut self, identifier: TestIdentifier) -> Result<(), PlanError> {
        let id = identifier.unique_id.clone();
        if self.identifiers.contains_key(&id) {
            return Err(PlanError::DuplicateIdentifier(id));
        }
        match &identifier.parent_id {
            Some(parent) => {
                if !self.identifiers.contains_key(parent) {
                    return Err(PlanError::UnknownParent {
                        id,
                        parent: parent.clone(),
                    });
                }
                self.children
                    .entry(parent.clone())
                    .or_default()
                    .push(id.clone());
            }
            None => self.roots.push(id.clone()),
        }
        self.identifiers.insert(id, identifier);
        Ok(())
    }

    pub fn roots(&self) -> impl Iterator<Item = &TestIdentifier> {
        self.roots.iter().filter_map(|id| self.identifiers.get(id))
    }

    pub fn get(&self, unique_id: &str) -> Option<&TestIdentifier> {
        self.identifiers.get(unique_id)
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.identifiers.contains_key(unique_id)
    }

    /// Direct children in registration order.
    pub fn children(&self, unique_id: &str) -> impl Iterator<Item = &TestIdentifier> {
        self.children
            .get(unique_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.identifiers.get(id))
    }

    /// The recorded parent, without any remapping.
    pub fn parent(&self, identifier: &TestIdentifier) -> Option<&TestIdentifier> {
        identifier
            .parent_id
            .as_deref()
            .and_then(|id| self.identifiers.get(id))
    }

    /// All descendants in depth-first pre-order.
    pub fn descendants(&self, unique_id: &str) -> Vec<&TestIdentifier> {
        let mut out = Vec::new();
        let mut stack: Vec<&TestIdentifier> = self.children(unique_id).collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut kids: Vec<&TestIdentifier> = self.children(&node.unique_id).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn contains_tests(&self) -> bool {
        self.identifiers.values().any(TestIdentifier::is_test)
    }

    pub fn count_tests(&self) -> usize {
        self.identifiers.values().filter(|i| i.is_test()).count()
    }
}
