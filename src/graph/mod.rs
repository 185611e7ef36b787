pub mod description;

pub use description::{Description, DescriptionGraph, DescriptionKind, DescriptionTree, GraphError};
