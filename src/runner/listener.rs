use parking_lot::Mutex;

use crate::graph::Description;
use crate::plan::types::{TestIdentifier, TestPlan};
use crate::runner::engine::ExecutionListener;
use crate::runner::host::{Failure, RunNotifier};
use crate::runner::result::{ExecutionStatus, TestExecutionResult};
use crate::runner::tree::{TestTree, TreeError};

/// Relays engine callbacks to the legacy notifier.
///
/// Each callback holds the tree lock for its whole duration, so dynamic
/// registration and the notifier calls it enables never interleave with
/// other callbacks. Events naming unregistered identifiers are not relayed;
/// they are kept as violations for the runner to report.
pub struct RunnerListener<'a> {
    tree: &'a Mutex<TestTree>,
    notifier: &'a dyn RunNotifier,
    violations: Mutex<Vec<TreeError>>,
}

impl<'a> RunnerListener<'a> {
    pub fn new(tree: &'a Mutex<TestTree>, notifier: &'a dyn RunNotifier) -> Self {
        Self {
            tree,
            notifier,
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Lookup failures seen so far, in arrival order.
    pub fn into_violations(self) -> Vec<TreeError> {
        self.violations.into_inner()
    }

    fn record(&self, error: TreeError) {
        tracing::error!(error = %error, "execution event references an unregistered test");
        self.violations.lock().push(error);
    }

    fn fire_ignored(&self, tree: &TestTree, identifier: &TestIdentifier, reason: &str) {
        match tree.description(&identifier.unique_id) {
            Ok(description) => {
                self.notifier.fire_test_ignored(description, reason);
                let name = tree.name_for(identifier);
                tracing::warn!(test = %name, reason, "{name} is ignored. {reason}");
            }
            Err(e) => self.record(e),
        }
    }

    fn suite_description(&self) -> Description {
        self.tree.lock().suite_description().clone()
    }
}

impl ExecutionListener for RunnerListener<'_> {
    fn plan_execution_started(&self, _plan: &TestPlan) {
        self.notifier
            .fire_test_suite_started(&self.suite_description());
    }

    fn dynamic_test_registered(&self, identifier: &TestIdentifier) {
        let mut tree = self.tree.lock();
        if let Err(e) = tree.add_dynamic(identifier.clone()) {
            self.record(e);
        }
    }

    fn execution_started(&self, identifier: &TestIdentifier) {
        let tree = self.tree.lock();
        match tree.description(&identifier.unique_id) {
            Ok(description) if identifier.is_test() => self.notifier.fire_test_started(description),
            Ok(_) => {}
            Err(e) => self.record(e),
        }
    }

    fn execution_skipped(&self, identifier: &TestIdentifier, reason: &str) {
        let tree = self.tree.lock();
        if identifier.is_test() {
            self.fire_ignored(&tree, identifier, reason);
            return;
        }
        if !tree.contains(&identifier.unique_id) {
            self.record(TreeError::UnknownIdentifier(identifier.unique_id.clone()));
            return;
        }
        for test in tree.tests_in_subtree(&identifier.unique_id) {
            self.fire_ignored(&tree, test, reason);
        }
    }

    fn execution_finished(&self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        let tree = self.tree.lock();
        let description = match tree.description(&identifier.unique_id) {
            Ok(description) => description,
            Err(e) => {
                self.record(e);
                return;
            }
        };

        match result.status {
            ExecutionStatus::Aborted => self
                .notifier
                .fire_test_assumption_failed(&Failure::new(description.clone(), result.cause.clone())),
            ExecutionStatus::Failed => self
                .notifier
                .fire_test_failure(&Failure::new(description.clone(), result.cause.clone())),
            ExecutionStatus::Successful => {}
        }
        if identifier.is_test() {
            self.notifier.fire_test_finished(description);
        }
    }

    fn plan_execution_finished(&self, _plan: &TestPlan) {
        self.notifier
            .fire_test_suite_finished(&self.suite_description());
    }
}
