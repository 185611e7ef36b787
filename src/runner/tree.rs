use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::graph::{Description, DescriptionGraph, DescriptionTree, GraphError};
use crate::plan::selectors::TestClass;
use crate::plan::types::{PlanError, TestIdentifier, TestKind, TestPlan};
use crate::runner::naming::{format_name, technical_name};

/// Class label of a test description without any parent.
pub const UNROOTED: &str = "<unrooted>";

/// Separator between the parts of a chained dynamic name.
const DYNAMIC_NAME_SEPARATOR: &str = " - ";

/// Errors from building or growing the test tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("no description registered for \"{0}\"")]
    UnknownIdentifier(String),
    #[error("\"{id}\" was registered below unknown parent \"{parent}\"")]
    UnknownParent { id: String, parent: String },
    #[error("dynamic identifier \"{0}\" has no parent")]
    MissingParent(String),
    #[error("\"{0}\" is already registered")]
    DuplicateIdentifier(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Projection of the engine's test plan onto the legacy description graph.
///
/// Leaf tests and dynamic nodes get attached descriptions. Plain containers
/// get a registered suite description but stay detached; their children
/// attach to the nearest attached ancestor, ultimately the root suite. The
/// id-to-description map only grows.
#[derive(Debug)]
pub struct TestTree {
    plan: TestPlan,
    graph: DescriptionGraph,
    root: NodeIndex,
    suite: Description,
    descriptions: HashMap<String, NodeIndex>,
    /// Where the children of each registered node attach.
    attach_points: HashMap<String, NodeIndex>,
    isolated_method_run: bool,
}

impl TestTree {
    /// Build the initial tree for `plan` under a root suite named after
    /// `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] if the graph rejects an attachment, which means
    /// the plan was not a tree.
    pub fn new(
        plan: TestPlan,
        target: &TestClass,
        isolated_method_run: bool,
    ) -> Result<Self, TreeError> {
        let mut graph = DescriptionGraph::new();
        let root = graph.create_suite(target.suite_name(), None);
        let mut tree = Self {
            plan,
            graph,
            root,
            suite: Description::suite(target.suite_name(), None),
            descriptions: HashMap::new(),
            attach_points: HashMap::new(),
            isolated_method_run,
        };

        let roots: Vec<String> = tree.plan.roots().map(|r| r.unique_id.clone()).collect();
        for id in roots {
            tree.build(&id, root)?;
        }
        Ok(tree)
    }

    fn build(&mut self, unique_id: &str, parent: NodeIndex) -> Result<(), TreeError> {
        let identifier = self
            .plan
            .get(unique_id)
            .ok_or_else(|| TreeError::UnknownIdentifier(unique_id.to_owned()))?;
        let name = self.name_for(identifier);

        let (index, attach_point) = if identifier.is_test() || identifier.is_dynamic() {
            let class_name = self
                .reporting_parent(identifier)
                .map_or_else(|| UNROOTED.to_owned(), |p| self.name_for(p));
            let index = self.graph.create_test(&class_name, &name, unique_id);
            self.graph.add_child(parent, index)?;
            (index, index)
        } else {
            (self.graph.create_suite(&name, Some(unique_id)), parent)
        };
        self.descriptions.insert(unique_id.to_owned(), index);
        self.attach_points.insert(unique_id.to_owned(), attach_point);

        let children: Vec<String> = self
            .plan
            .children(unique_id)
            .map(|c| c.unique_id.clone())
            .collect();
        for child in children {
            self.build(&child, attach_point)?;
        }
        Ok(())
    }

    /// The name reported for an identifier.
    ///
    /// Containers use their technical name and tests their formatted display
    /// name. Dynamic nodes chain the formatted names of their dynamic
    /// ancestors, root-most first, except in isolated method runs where
    /// each is formatted alone.
    pub fn name_for(&self, identifier: &TestIdentifier) -> String {
        match identifier.kind {
            TestKind::Dynamic { .. } if self.isolated_method_run => format_name(identifier, true),
            TestKind::Dynamic { .. } => {
                let mut parts = Vec::new();
                let mut current = Some(identifier);
                while let Some(node) = current
                    && node.is_dynamic()
                {
                    parts.push(format_name(node, false));
                    current = self.real_parent(node);
                }
                parts.reverse();
                parts.join(DYNAMIC_NAME_SEPARATOR)
            }
            TestKind::Container => technical_name(identifier),
            TestKind::Test => format_name(identifier, self.isolated_method_run),
        }
    }

    /// The parent recorded by the engine.
    pub fn real_parent(&self, identifier: &TestIdentifier) -> Option<&TestIdentifier> {
        self.plan.parent(identifier)
    }

    /// The parent used for reporting: dynamic nodes skip their dynamic
    /// ancestors and report against the first non-dynamic one.
    pub fn reporting_parent(&self, identifier: &TestIdentifier) -> Option<&TestIdentifier> {
        let mut parent = self.real_parent(identifier);
        if identifier.is_dynamic() {
            while let Some(node) = parent
                && node.is_dynamic()
            {
                parent = self.real_parent(node);
            }
        }
        parent
    }

    /// Register a node the engine created at run time. Its description is
    /// in place before this returns. Registering an identical identifier
    /// again, as a repeated run does, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] if the identifier has no parent, names an
    /// unregistered parent or reuses a registered id with different data.
    pub fn add_dynamic(&mut self, identifier: TestIdentifier) -> Result<(), TreeError> {
        let id = identifier.unique_id.clone();
        let parent = identifier
            .parent_id
            .clone()
            .ok_or_else(|| TreeError::MissingParent(id.clone()))?;
        if self.descriptions.contains_key(&id) {
            if self.plan.get(&id) == Some(&identifier) {
                return Ok(());
            }
            return Err(TreeError::DuplicateIdentifier(id));
        }
        let attach_point = *self
            .attach_points
            .get(&parent)
            .ok_or(TreeError::UnknownParent {
                id: id.clone(),
                parent,
            })?;

        self.plan.add(identifier)?;
        self.build(&id, attach_point)
    }

    /// The description registered for `unique_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownIdentifier`] if nothing was registered.
    pub fn description(&self, unique_id: &str) -> Result<&Description, TreeError> {
        self.descriptions
            .get(unique_id)
            .and_then(|index| self.graph.get(*index))
            .ok_or_else(|| TreeError::UnknownIdentifier(unique_id.to_owned()))
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.descriptions.contains_key(unique_id)
    }

    /// Every leaf test below `unique_id`, depth-first.
    pub fn tests_in_subtree(&self, unique_id: &str) -> Vec<&TestIdentifier> {
        self.plan
            .descendants(unique_id)
            .into_iter()
            .filter(|d| d.is_test())
            .collect()
    }

    pub fn suite_description(&self) -> &Description {
        &self.suite
    }

    /// An owned copy of the whole description tree.
    pub fn snapshot(&self) -> DescriptionTree {
        self.graph
            .snapshot(self.root)
            .unwrap_or_else(|| DescriptionTree {
                description: self.suite.clone(),
                children: Vec::new(),
            })
    }

    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    pub fn get(&self, unique_id: &str) -> Option<&TestIdentifier> {
        self.plan.get(unique_id)
    }

    pub fn is_isolated_method_run(&self) -> bool {
        self.isolated_method_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::TestSource;

    const ENGINE: &str = "[engine:jupiter]";
    const CLASS: &str = "[engine:jupiter]/[class:com.example.CartTest]";
    const ADDS: &str = "[engine:jupiter]/[class:com.example.CartTest]/[method:adds()]";
    const TEMPLATE: &str =
        "[engine:jupiter]/[class:com.example.CartTest]/[test-template:removes(java.lang.String)]";
    const NESTED: &str = "[engine:jupiter]/[class:com.example.CartTest]/[nested-class:Empty]";
    const NESTED_TEST: &str =
        "[engine:jupiter]/[class:com.example.CartTest]/[nested-class:Empty]/[method:isEmpty()]";

    fn invocation_id(n: u32) -> String {
        format!("{TEMPLATE}/[test-template-invocation:#{n}]")
    }

    fn plan() -> TestPlan {
        TestPlan::from_identifiers([
            TestIdentifier::new(ENGINE, "JUnit Jupiter", TestKind::Container),
            TestIdentifier::new(CLASS, "Cart", TestKind::Container)
                .with_parent(ENGINE)
                .with_source(TestSource::Class {
                    class_name: "com.example.CartTest".into(),
                }),
            TestIdentifier::new(ADDS, "adds()", TestKind::Test).with_parent(CLASS),
            TestIdentifier::new(TEMPLATE, "removes(String)", TestKind::infer(TEMPLATE, false))
                .with_parent(CLASS)
                .with_source(TestSource::Method {
                    class_name: "com.example.CartTest".into(),
                    method_name: "removes".into(),
                    parameter_types: "java.lang.String".into(),
                }),
            TestIdentifier::new(NESTED, "Empty", TestKind::Container)
                .with_parent(CLASS)
                .with_source(TestSource::Class {
                    class_name: "com.example.CartTest$Empty".into(),
                }),
            TestIdentifier::new(NESTED_TEST, "isEmpty()", TestKind::Test).with_parent(NESTED),
        ])
        .unwrap()
    }

    fn invocation(n: u32, value: &str) -> TestIdentifier {
        let id = invocation_id(n);
        TestIdentifier::new(&id, &format!("[{n}] \"{value}\""), TestKind::infer(&id, true))
            .with_parent(TEMPLATE)
            .with_legacy_name(&format!("removes(String)[{n}]"))
    }

    fn tree(isolated: bool) -> TestTree {
        TestTree::new(plan(), &TestClass::new("com.example.CartTest"), isolated).unwrap()
    }

    // ── initial build ──────────────────────────────────────

    #[test]
    fn every_identifier_gets_a_description() {
        let tree = tree(false);
        for id in [ENGINE, CLASS, ADDS, TEMPLATE, NESTED, NESTED_TEST] {
            assert!(tree.contains(id), "{id} missing");
        }
    }

    #[test]
    fn root_suite_uses_class_name_or_display_name() {
        assert_eq!(tree(false).suite_description().class_name, "com.example.CartTest");
        let named = TestTree::new(
            plan(),
            &TestClass::new("com.example.CartTest").with_display_name("Cart behaviour"),
            false,
        )
        .unwrap();
        assert_eq!(named.suite_description().display_name(), "Cart behaviour");
    }

    #[test]
    fn tree_is_flat_below_root_suite() {
        let snapshot = tree(false).snapshot();
        let names: Vec<String> = snapshot
            .children
            .iter()
            .map(|c| c.description.display_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "adds(com.example.CartTest)",
                "removes[String](com.example.CartTest)",
                "isEmpty(com.example.CartTest$Empty)",
            ]
        );
        assert_eq!(snapshot.test_count(), 3);
    }

    #[test]
    fn containers_get_detached_suite_descriptions() {
        let tree = tree(false);
        let class = tree.description(CLASS).unwrap();
        assert!(class.is_suite());
        assert_eq!(class.class_name, "com.example.CartTest");
        assert_eq!(class.unique_id.as_deref(), Some(CLASS));
        assert_eq!(tree.description(ENGINE).unwrap().class_name, "JUnit Jupiter");
    }

    #[test]
    fn root_level_test_is_unrooted() {
        let plan = TestPlan::from_identifiers([TestIdentifier::new(
            "[engine:e]/[method:solo()]",
            "solo()",
            TestKind::Test,
        )])
        .unwrap();
        let tree = TestTree::new(plan, &TestClass::new("a.Solo"), false).unwrap();
        let description = tree.description("[engine:e]/[method:solo()]").unwrap();
        assert_eq!(description.class_name, UNROOTED);
        assert_eq!(description.method_name.as_deref(), Some("solo"));
    }

    // ── name synthesis ─────────────────────────────────────

    #[test]
    fn container_name_is_technical() {
        let tree = tree(false);
        assert_eq!(tree.name_for(tree.get(CLASS).unwrap()), "com.example.CartTest");
        assert_eq!(tree.name_for(tree.get(NESTED).unwrap()), "com.example.CartTest$Empty");
    }

    #[test]
    fn dynamic_chain_joins_formatted_levels() {
        let mut tree = tree(false);
        tree.add_dynamic(invocation(1, "milk")).unwrap();
        let identifier = tree.get(&invocation_id(1)).unwrap();
        let expected = format!(
            "{} - {}",
            format_name(tree.get(TEMPLATE).unwrap(), false),
            format_name(identifier, false)
        );
        assert_eq!(tree.name_for(identifier), expected);
        assert_eq!(tree.name_for(identifier), "removes[String] - [1] milk");
        assert_eq!(tree.name_for(identifier), tree.name_for(identifier));
    }

    #[test]
    fn isolated_run_formats_dynamic_nodes_alone() {
        let mut tree = tree(true);
        tree.add_dynamic(invocation(2, "eggs")).unwrap();
        let description = tree.description(&invocation_id(2)).unwrap();
        assert_eq!(description.method_name.as_deref(), Some("removes[2]"));
    }

    #[test]
    fn isolated_run_strips_parameters_of_plain_tests() {
        let plan = TestPlan::from_identifiers([
            TestIdentifier::new("C", "C", TestKind::Container),
            TestIdentifier::new("C/t", "test(String, int)", TestKind::Test).with_parent("C"),
        ])
        .unwrap();
        let tree = TestTree::new(plan, &TestClass::new("C"), true).unwrap();
        assert_eq!(tree.name_for(tree.get("C/t").unwrap()), "test");
    }

    // ── parent views ───────────────────────────────────────

    #[test]
    fn real_and_reporting_parents_differ_for_invocations() {
        let mut tree = tree(false);
        tree.add_dynamic(invocation(1, "milk")).unwrap();
        let identifier = tree.get(&invocation_id(1)).unwrap();
        assert_eq!(tree.real_parent(identifier).unwrap().unique_id, TEMPLATE);
        assert_eq!(tree.reporting_parent(identifier).unwrap().unique_id, CLASS);
    }

    #[test]
    fn real_and_reporting_parents_agree_for_plain_tests() {
        let tree = tree(false);
        let identifier = tree.get(NESTED_TEST).unwrap();
        assert_eq!(tree.real_parent(identifier).unwrap().unique_id, NESTED);
        assert_eq!(tree.reporting_parent(identifier).unwrap().unique_id, NESTED);
    }

    // ── dynamic registration ───────────────────────────────

    #[test]
    fn dynamic_nodes_attach_below_their_parent_description() {
        let mut tree = tree(false);
        tree.add_dynamic(invocation(1, "milk")).unwrap();
        tree.add_dynamic(invocation(2, "eggs")).unwrap();

        let description = tree.description(&invocation_id(1)).unwrap();
        assert_eq!(description.class_name, "com.example.CartTest");

        let snapshot = tree.snapshot();
        let template = &snapshot.children[1];
        assert_eq!(template.children.len(), 2);
        assert_eq!(
            template.children[1].description.method_name.as_deref(),
            Some("removes[String] - [2] eggs")
        );
        assert_eq!(tree.tests_in_subtree(TEMPLATE).len(), 2);
    }

    #[test]
    fn dynamic_registration_rejects_bad_input() {
        let mut tree = tree(false);
        let orphan = TestIdentifier::new("x", "x", TestKind::Dynamic { leaf: true });
        assert_eq!(
            tree.add_dynamic(orphan).unwrap_err(),
            TreeError::MissingParent("x".into())
        );

        let unknown = TestIdentifier::new("y", "y", TestKind::Dynamic { leaf: true })
            .with_parent("[engine:jupiter]/[class:Nope]");
        assert!(matches!(
            tree.add_dynamic(unknown),
            Err(TreeError::UnknownParent { .. })
        ));

        tree.add_dynamic(invocation(1, "milk")).unwrap();
        assert_eq!(
            tree.add_dynamic(invocation(1, "butter")).unwrap_err(),
            TreeError::DuplicateIdentifier(invocation_id(1))
        );
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let mut tree = tree(false);
        tree.add_dynamic(invocation(1, "milk")).unwrap();
        let before = tree.snapshot();
        tree.add_dynamic(invocation(1, "milk")).unwrap();
        assert_eq!(tree.snapshot(), before);
        assert_eq!(tree.tests_in_subtree(TEMPLATE).len(), 1);
    }

    #[test]
    fn unknown_lookup_is_an_error() {
        let err = tree(false).description("missing").unwrap_err();
        assert_eq!(err.to_string(), "no description registered for \"missing\"");
    }

    #[test]
    fn subtree_tests_skip_containers() {
        let tree = tree(false);
        let ids: Vec<&str> = tree
            .tests_in_subtree(CLASS)
            .iter()
            .map(|i| i.unique_id.as_str())
            .collect();
        assert_eq!(ids, vec![ADDS, NESTED_TEST]);
    }
}
