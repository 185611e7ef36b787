use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::DescriptionTree;
use crate::params::{RunArguments, RunParameters};
use crate::plan::discovery::{SkippedClass, discover_plan};
use crate::plan::request::DiscoveryRequest;
use crate::plan::selectors::TestClass;
use crate::runner::engine::TestEngine;
use crate::runner::host::{RunNotifier, Runner};
use crate::runner::listener::RunnerListener;
use crate::runner::parallel::ParallelRunNotifier;
use crate::runner::tree::TestTree;

/// Runs one test class through an engine and reports to the legacy host.
///
/// Construction resolves parameters, discovers the plan and builds the
/// description tree; [`Runner::run`] executes it.
pub struct BridgeRunner {
    engine: Arc<dyn TestEngine>,
    parameters: RunParameters,
    tree: Mutex<TestTree>,
    skipped: Vec<SkippedClass>,
}

impl BridgeRunner {
    /// Create a runner for `target`, resolving parameters from `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if discovery fails for a reason other than an
    /// unloadable class.
    pub fn new(
        engine: Arc<dyn TestEngine>,
        target: &TestClass,
        arguments: &RunArguments,
    ) -> Result<Self, RunError> {
        let parameters = RunParameters::resolve(arguments, target);
        Self::with_parameters(engine, target, parameters)
    }

    /// Create a runner from already resolved parameters (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if discovery fails for a reason other than an
    /// unloadable class.
    pub fn with_parameters(
        engine: Arc<dyn TestEngine>,
        target: &TestClass,
        parameters: RunParameters,
    ) -> Result<Self, RunError> {
        let request = DiscoveryRequest::from_parameters(&parameters);
        let discovery = discover_plan(engine.as_ref(), &request).map_err(|e| RunError {
            kind: RunErrorKind::DiscoveryFailed,
            message: e.to_string(),
            detail: Some(format!("target class: {}", target.name)),
        })?;

        let tree = TestTree::new(discovery.plan, target, parameters.is_isolated_method_run)
            .map_err(|e| RunError {
                kind: RunErrorKind::InvariantViolation,
                message: e.to_string(),
                detail: Some(format!("engine: {}", engine.name())),
            })?;

        Ok(Self {
            engine,
            parameters,
            tree: Mutex::new(tree),
            skipped: discovery.skipped,
        })
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.parameters
    }

    /// Classes dropped during discovery because they could not be loaded.
    pub fn skipped_classes(&self) -> &[SkippedClass] {
        &self.skipped
    }

    /// Number of leaf tests currently known, including dynamic ones
    /// registered by earlier runs.
    pub fn test_count(&self) -> usize {
        self.tree.lock().plan().count_tests()
    }

    fn check_configuration(&self) -> Result<(), RunError> {
        if self.parameters.is_using_orchestrator && self.parameters.is_parallel_execution_enabled {
            tracing::error!(
                engine = self.engine.name(),
                "parallel execution cannot be combined with an orchestrator"
            );
            return Err(RunError {
                kind: RunErrorKind::IncompatibleConfiguration,
                message: "parallel execution is not supported when running with an orchestrator"
                    .into(),
                detail: Some(
                    "disable the orchestrator or remove the parallel execution parameter".into(),
                ),
            });
        }
        Ok(())
    }
}

impl Runner for BridgeRunner {
    fn description(&self) -> DescriptionTree {
        self.tree.lock().snapshot()
    }

    fn run(&self, notifier: &dyn RunNotifier) -> Result<(), RunError> {
        self.check_configuration()?;

        let plan = self.tree.lock().plan().clone();
        let parallel;
        let notifier: &dyn RunNotifier = if self.parameters.is_parallel_execution_enabled {
            parallel = ParallelRunNotifier::new(notifier);
            &parallel
        } else {
            notifier
        };

        let listener = RunnerListener::new(&self.tree, notifier);
        self.engine.execute(&plan, &listener);

        let violations = listener.into_violations();
        if violations.is_empty() {
            return Ok(());
        }
        Err(RunError {
            kind: RunErrorKind::InvariantViolation,
            message: format!(
                "{} execution event(s) could not be mapped onto the test tree",
                violations.len()
            ),
            detail: Some(
                violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        })
    }
}

/// Create a runner only if it has tests to contribute, so the host's class
/// count matches the classes actually tested.
///
/// # Errors
///
/// Returns [`RunError`] if runner construction fails.
pub fn try_create_runner(
    engine: Arc<dyn TestEngine>,
    target: &TestClass,
    arguments: &RunArguments,
) -> Result<Option<BridgeRunner>, RunError> {
    let runner = BridgeRunner::new(engine, target, arguments)?;
    if runner.description().children.is_empty() {
        tracing::debug!(class = %target.name, "no executable tests, skipping class");
        return Ok(None);
    }
    Ok(Some(runner))
}

/// Error from the runner orchestration layer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

/// Classification of runner errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunErrorKind {
    /// Options that cannot be used together.
    IncompatibleConfiguration,
    /// The engine could not discover tests.
    DiscoveryFailed,
    /// An event or plan referenced a test the tree does not know.
    InvariantViolation,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleConfiguration => write!(f, "incompatible configuration"),
            Self::DiscoveryFailed => write!(f, "discovery failed"),
            Self::InvariantViolation => write!(f, "invariant violation"),
        }
    }
}
