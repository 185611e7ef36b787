use serde::{Deserialize, Serialize};

/// A declared method of a test class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethod {
    pub name: String,
    /// Comma-separated parameter type names, empty for no parameters.
    #[serde(default)]
    pub parameter_types: String,
}

impl TestMethod {
    pub fn new(name: &str, parameter_types: &str) -> Self {
        Self {
            name: name.to_owned(),
            parameter_types: parameter_types.to_owned(),
        }
    }
}

/// The class a runner is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClass {
    /// Fully qualified name.
    pub name: String,
    /// Value of a suite display-name annotation, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub methods: Vec<TestMethod>,
}

impl TestClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            display_name: None,
            methods: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_owned());
        self
    }

    pub fn with_method(mut self, name: &str, parameter_types: &str) -> Self {
        self.methods.push(TestMethod::new(name, parameter_types));
        self
    }

    /// The name of the root suite: a non-blank display name wins over the raw
    /// class name.
    pub fn suite_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// What the discovery engine is asked to look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoverySelector {
    Package {
        package_name: String,
    },
    Class {
        class_name: String,
    },
    Method {
        class_name: String,
        method_name: String,
        #[serde(default)]
        parameter_types: String,
    },
}

impl DiscoverySelector {
    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method { .. })
    }
}

/// Turn the host's `class` argument into selectors for `target`.
///
/// The argument lists `pkg.Class#method` components separated by commas.
/// Components for other classes are ignored; each `#method` naming the
/// target selects every declared overload with that name. When nothing
/// applies, the whole class is selected.
pub fn selectors_for(target: &TestClass, class_argument: Option<&str>) -> Vec<DiscoverySelector> {
    let mut selectors = Vec::new();

    if let Some(argument) = class_argument {
        for component in argument.split(',').map(str::trim) {
            let Some(rest) = component.strip_prefix(target.name.as_str()) else {
                continue;
            };
            let Some(method_name) = rest.strip_prefix('#') else {
                continue;
            };
            selectors.extend(
                target
                    .methods
                    .iter()
                    .filter(|m| m.name == method_name)
                    .map(|m| DiscoverySelector::Method {
                        class_name: target.name.clone(),
                        method_name: m.name.clone(),
                        parameter_types: m.parameter_types.clone(),
                    }),
            );
        }
    }

    if selectors.is_empty() {
        selectors.push(DiscoverySelector::Class {
            class_name: target.name.clone(),
        });
    }
    selectors
}

/// A run is an isolated method run when exactly one method was selected.
pub fn is_isolated_method_run(selectors: &[DiscoverySelector]) -> bool {
    matches!(selectors, [only] if only.is_method())
}
