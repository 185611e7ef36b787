pub mod discovery;
pub mod filter;
pub mod request;
pub mod selectors;
pub mod types;
