//! Shared helpers for the integration tests: a scripted engine driven by
//! YAML fixtures and a notifier that records everything it is told.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::Deserialize;

use testbridge::graph::Description;
use testbridge::plan::discovery::DiscoveryError;
use testbridge::plan::request::DiscoveryRequest;
use testbridge::plan::selectors::TestClass;
use testbridge::plan::types::{TestIdentifier, TestPlan};
use testbridge::runner::engine::{ExecutionListener, TestEngine};
use testbridge::runner::host::{Failure, RunNotifier};
use testbridge::runner::result::TestExecutionResult;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// -- Fixtures --

/// One test class: what discovery returns and what execution reports.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub class: TestClass,
    /// Make discovery fail as if the class could not be loaded.
    #[serde(default)]
    pub class_load_error: Option<String>,
    /// Identifiers in parent-before-child order.
    #[serde(default)]
    pub plan: Vec<TestIdentifier>,
    #[serde(default)]
    pub script: Vec<Step>,
}

/// One execution event of a fixture script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Step {
    Started {
        id: String,
    },
    Finished {
        id: String,
        #[serde(default = "TestExecutionResult::successful")]
        result: TestExecutionResult,
    },
    Skipped {
        id: String,
        reason: String,
    },
    Register {
        identifier: TestIdentifier,
    },
}

pub fn load_fixture(name: &str) -> Fixture {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture is readable");
    serde_yaml::from_str(&text).expect("fixture is valid YAML")
}

// -- Scripted engine --

/// Discovers the fixture's plan and replays its script. Steps for nodes
/// that are not part of the executed plan are left out, the way a real
/// engine only runs what it was handed.
pub struct ScriptedEngine {
    fixture: Fixture,
}

impl ScriptedEngine {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    pub fn from_fixture(name: &str) -> Self {
        Self::new(load_fixture(name))
    }

    pub fn class(&self) -> &TestClass {
        &self.fixture.class
    }
}

impl TestEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn discover(&self, _request: &DiscoveryRequest) -> Result<TestPlan, DiscoveryError> {
        if let Some(message) = &self.fixture.class_load_error {
            return Err(DiscoveryError::ClassLoad {
                class_name: self.fixture.class.name.clone(),
                message: message.clone(),
            });
        }
        TestPlan::from_identifiers(self.fixture.plan.clone())
            .map_err(|e| DiscoveryError::Engine(e.to_string()))
    }

    fn execute(&self, plan: &TestPlan, listener: &dyn ExecutionListener) {
        let mut known: HashMap<String, TestIdentifier> = HashMap::new();
        for root in plan.roots() {
            known.insert(root.unique_id.clone(), root.clone());
            for node in plan.descendants(&root.unique_id) {
                known.insert(node.unique_id.clone(), node.clone());
            }
        }

        listener.plan_execution_started(plan);
        for step in &self.fixture.script {
            match step {
                Step::Started { id } => {
                    if let Some(identifier) = known.get(id) {
                        listener.execution_started(identifier);
                    }
                }
                Step::Finished { id, result } => {
                    if let Some(identifier) = known.get(id) {
                        listener.execution_finished(identifier, result);
                    }
                }
                Step::Skipped { id, reason } => {
                    if let Some(identifier) = known.get(id) {
                        listener.execution_skipped(identifier, reason);
                    }
                }
                Step::Register { identifier } => {
                    let parent_known = identifier
                        .parent_id
                        .as_ref()
                        .is_some_and(|parent| known.contains_key(parent));
                    if parent_known {
                        known.insert(identifier.unique_id.clone(), identifier.clone());
                        listener.dynamic_test_registered(identifier);
                    }
                }
            }
        }
        listener.plan_execution_finished(plan);
    }
}

// -- Recording notifier --

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SuiteStarted(String),
    Started(String),
    Ignored(String, String),
    Failure(String, String),
    AssumptionFailed(String, String),
    Finished(String),
    SuiteFinished(String),
}

impl Event {
    pub fn started(name: &str) -> Self {
        Self::Started(name.to_owned())
    }

    pub fn finished(name: &str) -> Self {
        Self::Finished(name.to_owned())
    }

    pub fn ignored(name: &str, reason: &str) -> Self {
        Self::Ignored(name.to_owned(), reason.to_owned())
    }

    pub fn failure(name: &str, message: &str) -> Self {
        Self::Failure(name.to_owned(), message.to_owned())
    }

    pub fn assumption_failed(name: &str, message: &str) -> Self {
        Self::AssumptionFailed(name.to_owned(), message.to_owned())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn message(failure: &Failure) -> String {
    failure.message().unwrap_or_default().to_owned()
}

impl RunNotifier for RecordingNotifier {
    fn fire_test_suite_started(&self, description: &Description) {
        self.push(Event::SuiteStarted(description.display_name()));
    }

    fn fire_test_started(&self, description: &Description) {
        self.push(Event::Started(description.display_name()));
    }

    fn fire_test_ignored(&self, description: &Description, reason: &str) {
        self.push(Event::Ignored(description.display_name(), reason.to_owned()));
    }

    fn fire_test_failure(&self, failure: &Failure) {
        self.push(Event::Failure(failure.description.display_name(), message(failure)));
    }

    fn fire_test_assumption_failed(&self, failure: &Failure) {
        self.push(Event::AssumptionFailed(
            failure.description.display_name(),
            message(failure),
        ));
    }

    fn fire_test_finished(&self, description: &Description) {
        self.push(Event::Finished(description.display_name()));
    }

    fn fire_test_suite_finished(&self, description: &Description) {
        self.push(Event::SuiteFinished(description.display_name()));
    }
}
