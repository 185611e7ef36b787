//! Run parameter resolution.
//!
//! The host hands a runner a bag of string arguments once at startup.
//! [`RunParameters::resolve`] folds them, together with the target class,
//! into the immutable value every later stage reads. Resolution never fails:
//! anything malformed degrades to an empty or default value.

pub mod properties;

use std::collections::HashMap;
use std::path::Path;

use crate::plan::filter::{PlanFilter, ShardingFilter, filters_from_lines};
use crate::plan::selectors::{DiscoverySelector, TestClass, is_isolated_method_run, selectors_for};

pub use properties::parse_properties;

pub const ARG_CLASS: &str = "class";
pub const ARG_ENVIRONMENT_VARIABLES: &str = "environmentVariables";
pub const ARG_SYSTEM_PROPERTIES: &str = "systemProperties";
pub const ARG_CONFIGURATION_PARAMETERS: &str = "configurationParameters";
pub const ARG_NUM_SHARDS: &str = "numShards";
pub const ARG_SHARD_INDEX: &str = "shardIndex";
pub const ARG_ORCHESTRATOR_SERVICE: &str = "orchestratorService";

/// Configuration parameter that turns on in-process parallel execution.
pub const PARALLEL_EXECUTION_KEY: &str = "junit.jupiter.execution.parallel.enabled";

/// The ambient argument source: string key/value pairs plus the contents of
/// a generated filter file, if one was provided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArguments {
    values: HashMap<String, String>,
    filter_lines: Option<String>,
}

impl RunArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |args, (key, value)| args.with(key, value))
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn with_filter_lines(mut self, contents: &str) -> Self {
        self.filter_lines = Some(contents.to_owned());
        self
    }

    /// Read generated filter directives from `path`. A missing or unreadable
    /// file leaves the arguments without filter lines.
    pub fn with_filter_file(mut self, path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => self.filter_lines = Some(contents),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no generated filters");
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn filter_lines(&self) -> Option<&str> {
        self.filter_lines.as_deref()
    }
}

/// Everything a run needs to know about its arguments, resolved once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParameters {
    pub selectors: Vec<DiscoverySelector>,
    pub filters: Vec<PlanFilter>,
    pub environment_variables: HashMap<String, String>,
    pub system_properties: HashMap<String, String>,
    pub configuration_parameters: HashMap<String, String>,
    /// Exactly one method was selected.
    pub is_isolated_method_run: bool,
    /// An external orchestrator process drives the run.
    pub is_using_orchestrator: bool,
    pub is_parallel_execution_enabled: bool,
}

impl RunParameters {
    pub fn resolve(arguments: &RunArguments, target: &TestClass) -> Self {
        let selectors = selectors_for(target, arguments.get(ARG_CLASS));
        let is_isolated_method_run = is_isolated_method_run(&selectors);

        let mut filters = arguments
            .filter_lines()
            .map(filters_from_lines)
            .unwrap_or_default();
        match ShardingFilter::from_arguments(
            arguments.get(ARG_NUM_SHARDS),
            arguments.get(ARG_SHARD_INDEX),
        ) {
            Some(shard) => filters.push(PlanFilter::Shard(shard)),
            None => {
                if arguments.get(ARG_NUM_SHARDS).is_some() || arguments.get(ARG_SHARD_INDEX).is_some() {
                    tracing::debug!(
                        num_shards = arguments.get(ARG_NUM_SHARDS),
                        shard_index = arguments.get(ARG_SHARD_INDEX),
                        "ignoring invalid sharding arguments"
                    );
                }
            }
        }

        let list = |key: &str| arguments.get(key).map(parse_properties).unwrap_or_default();
        let configuration_parameters = list(ARG_CONFIGURATION_PARAMETERS);
        let is_parallel_execution_enabled = configuration_parameters
            .get(PARALLEL_EXECUTION_KEY)
            .is_some_and(|v| v == "true");

        Self {
            selectors,
            filters,
            environment_variables: list(ARG_ENVIRONMENT_VARIABLES),
            system_properties: list(ARG_SYSTEM_PROPERTIES),
            configuration_parameters,
            is_isolated_method_run,
            is_using_orchestrator: arguments.get(ARG_ORCHESTRATOR_SERVICE).is_some(),
            is_parallel_execution_enabled,
        }
    }
}
