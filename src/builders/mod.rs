//! Builders assembling node components from configuration.

pub mod node_builder;

pub use node_builder::NodeBuilder;
