use crate::plan::discovery::DiscoveryError;
use crate::plan::request::DiscoveryRequest;
use crate::plan::types::{TestIdentifier, TestPlan};
use crate::runner::result::TestExecutionResult;

/// Trait implemented by the discovery-and-execution engine the bridge
/// drives.
pub trait TestEngine: Send + Sync {
    /// Human-readable engine name, used in log output.
    fn name(&self) -> &str;

    /// Discover the tree of tests matching the request.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::ClassLoad`] when a scanned class cannot be
    /// loaded, or [`DiscoveryError::Engine`] for anything else.
    fn discover(&self, request: &DiscoveryRequest) -> Result<TestPlan, DiscoveryError>;

    /// Execute a discovered plan, reporting progress to `listener`.
    ///
    /// The listener may be called from several threads at once. A failing
    /// test is not an engine error; it is reported through
    /// [`ExecutionListener::execution_finished`].
    fn execute(&self, plan: &TestPlan, listener: &dyn ExecutionListener);
}

/// Callbacks the engine fires while executing a plan.
///
/// Every method has a no-op default so listeners only implement what they
/// care about.
pub trait ExecutionListener: Send + Sync {
    fn plan_execution_started(&self, _plan: &TestPlan) {}

    /// A node that was not part of the discovered plan appeared. Its
    /// `parent_id` names an already known node.
    fn dynamic_test_registered(&self, _identifier: &TestIdentifier) {}

    fn execution_started(&self, _identifier: &TestIdentifier) {}

    fn execution_skipped(&self, _identifier: &TestIdentifier, _reason: &str) {}

    fn execution_finished(&self, _identifier: &TestIdentifier, _result: &TestExecutionResult) {}

    fn plan_execution_finished(&self, _plan: &TestPlan) {}
}
