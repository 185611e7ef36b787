//! Run a hierarchical test engine inside a legacy suite/test runner.
//!
//! The engine discovers a tree of tests and may grow it while executing.
//! The legacy host only understands a fixed graph of suite and test
//! descriptions plus a notifier. This crate resolves run arguments,
//! discovers the plan, projects it onto the host's description graph and
//! relays execution events back through the notifier.
//!
//! The entry point is [`runner::executor::BridgeRunner`], which implements
//! the host-facing [`runner::host::Runner`] trait.

pub mod graph;
pub mod params;
pub mod plan;
pub mod runner;
