use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::params::RunParameters;
use crate::plan::filter::PlanFilter;
use crate::plan::selectors::{DiscoverySelector, is_isolated_method_run};
use crate::plan::types::TestIdentifier;

/// What the discovery engine is asked to find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub selectors: Vec<DiscoverySelector>,
    #[serde(default)]
    pub filters: Vec<PlanFilter>,
    #[serde(default)]
    pub configuration_parameters: HashMap<String, String>,
}

impl DiscoveryRequest {
    pub fn from_parameters(parameters: &RunParameters) -> Self {
        Self {
            selectors: parameters.selectors.clone(),
            filters: parameters.filters.clone(),
            configuration_parameters: parameters.configuration_parameters.clone(),
        }
    }

    pub fn is_isolated_method_run(&self) -> bool {
        is_isolated_method_run(&self.selectors)
    }

    /// Whether every filter of the request accepts the identifier.
    pub fn admits(&self, identifier: &TestIdentifier) -> bool {
        self.filters.iter().all(|f| f.includes(identifier))
    }
}
