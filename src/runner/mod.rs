pub mod engine;
pub mod executor;
pub mod host;
pub mod listener;
pub mod naming;
pub mod parallel;
pub mod result;
pub mod tree;
