//! JSON policy configuration: schema and loader.
//!
//! The configuration is one JSON object naming the config, a list of
//! policy rules, and a list of named failure event sets. Each rule's
//! `bundleSource` and `bundleFinalDestination` arrays expand as a cross
//! product into individual policies. Loading validates everything up
//! front: pattern syntax, parameter names and ranges, key files (read once
//! and cached), action names, and event-set references. A dangling
//! reference aborts the load.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use schema::{
    ActionConfig, BpSecConfig, ContextParamConfig, EventSetConfig, OperationEventConfig,
    PolicyRuleConfig,
};

pub(crate) use loader::load;
