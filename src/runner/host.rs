use crate::graph::{Description, DescriptionTree};
use crate::runner::executor::RunError;
use crate::runner::result::FailureCause;

/// A failed or aborted test as the legacy host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub description: Description,
    pub cause: Option<FailureCause>,
}

impl Failure {
    pub fn new(description: Description, cause: Option<FailureCause>) -> Self {
        Self { description, cause }
    }

    pub fn message(&self) -> Option<&str> {
        self.cause.as_ref().map(|c| c.message.as_str())
    }
}

/// The legacy host's notification callback interface.
///
/// Implementations are shared between engine threads, so every method
/// takes `&self`.
pub trait RunNotifier: Send + Sync {
    fn fire_test_suite_started(&self, _description: &Description) {}

    fn fire_test_started(&self, description: &Description);

    fn fire_test_ignored(&self, description: &Description, reason: &str);

    fn fire_test_failure(&self, failure: &Failure);

    fn fire_test_assumption_failed(&self, failure: &Failure);

    fn fire_test_finished(&self, description: &Description);

    fn fire_test_suite_finished(&self, _description: &Description) {}
}

/// What the legacy host is allowed to do with a runner.
pub trait Runner {
    /// The root suite description and everything attached below it.
    fn description(&self) -> DescriptionTree;

    /// Execute the tests, reporting through `notifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for configuration problems detected before any
    /// test starts, and for events that referenced unknown tests.
    fn run(&self, notifier: &dyn RunNotifier) -> Result<(), RunError>;
}
