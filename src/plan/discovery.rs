use crate::plan::filter::filter_plan;
use crate::plan::request::DiscoveryRequest;
use crate::plan::types::TestPlan;
use crate::runner::engine::TestEngine;

/// Errors an engine may raise while discovering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// A scanned class could not be loaded on this runtime.
    #[error("cannot load class {class_name}: {message}")]
    ClassLoad { class_name: String, message: String },
    #[error("discovery failed: {0}")]
    Engine(String),
}

/// A class dropped from the run because it could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedClass {
    pub class_name: String,
    pub message: String,
}

/// The outcome of discovery: the plan to run, plus whatever was dropped on
/// the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub plan: TestPlan,
    pub skipped: Vec<SkippedClass>,
}

/// Ask the engine for a plan, once.
///
/// A class-load failure degrades to an empty plan and is recorded in
/// [`Discovery::skipped`]. The request's filters are applied to whatever the
/// engine returns, so engines that ignore them still honour sharding and
/// tag selection.
///
/// # Errors
///
/// Returns [`DiscoveryError::Engine`] for any other engine failure.
pub fn discover_plan(
    engine: &dyn TestEngine,
    request: &DiscoveryRequest,
) -> Result<Discovery, DiscoveryError> {
    match engine.discover(request) {
        Ok(plan) if request.filters.is_empty() => Ok(Discovery {
            plan,
            skipped: Vec::new(),
        }),
        Ok(plan) => Ok(Discovery {
            plan: filter_plan(&plan, &request.filters),
            skipped: Vec::new(),
        }),
        Err(DiscoveryError::ClassLoad {
            class_name,
            message,
        }) => {
            tracing::warn!(
                engine = engine.name(),
                class = %class_name,
                error = %message,
                "class could not be loaded, continuing with an empty test plan"
            );
            Ok(Discovery {
                plan: TestPlan::new(),
                skipped: vec![SkippedClass {
                    class_name,
                    message,
                }],
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::filter::{PlanFilter, TagPredicate};
    use crate::plan::types::{TestIdentifier, TestKind};
    use crate::runner::engine::ExecutionListener;

    struct FixedEngine {
        outcome: Result<TestPlan, DiscoveryError>,
    }

    impl TestEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        fn discover(&self, _request: &DiscoveryRequest) -> Result<TestPlan, DiscoveryError> {
            self.outcome.clone()
        }

        fn execute(&self, _plan: &TestPlan, _listener: &dyn ExecutionListener) {}
    }

    fn plan() -> TestPlan {
        TestPlan::from_identifiers([
            TestIdentifier::new("C", "C", TestKind::Container),
            TestIdentifier::new("C/fast", "fast()", TestKind::Test)
                .with_parent("C")
                .with_tags(&["fast"]),
            TestIdentifier::new("C/slow", "slow()", TestKind::Test)
                .with_parent("C")
                .with_tags(&["slow"]),
        ])
        .unwrap()
    }

    #[test]
    fn returns_engine_plan() {
        let engine = FixedEngine { outcome: Ok(plan()) };
        let discovery = discover_plan(&engine, &DiscoveryRequest::default()).unwrap();
        assert_eq!(discovery.plan, plan());
        assert!(discovery.skipped.is_empty());
    }

    #[test]
    fn class_load_failure_degrades_to_empty_plan() {
        let engine = FixedEngine {
            outcome: Err(DiscoveryError::ClassLoad {
                class_name: "a.Broken".into(),
                message: "NoClassDefFoundError".into(),
            }),
        };
        let discovery = discover_plan(&engine, &DiscoveryRequest::default()).unwrap();
        assert!(discovery.plan.is_empty());
        assert_eq!(discovery.skipped.len(), 1);
        assert_eq!(discovery.skipped[0].class_name, "a.Broken");
    }

    #[test]
    fn other_engine_errors_propagate() {
        let engine = FixedEngine {
            outcome: Err(DiscoveryError::Engine("no engines found".into())),
        };
        let err = discover_plan(&engine, &DiscoveryRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "discovery failed: no engines found");
    }

    #[test]
    fn request_filters_apply_to_engine_plan() {
        let engine = FixedEngine { outcome: Ok(plan()) };
        let request = DiscoveryRequest {
            filters: vec![PlanFilter::Tags(TagPredicate::Include("fast".into()))],
            ..DiscoveryRequest::default()
        };
        let discovery = discover_plan(&engine, &request).unwrap();
        assert!(discovery.plan.contains("C/fast"));
        assert!(!discovery.plan.contains("C/slow"));
    }
}
