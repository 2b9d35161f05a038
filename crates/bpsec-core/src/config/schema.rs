//! Serde schema for the JSON policy configuration.

use serde::Deserialize;

use crate::events::SecurityOperationEvent;
use crate::policy::{SecurityContextKind, SecurityRole, SecurityService};

use super::error::ConfigError;

/// The top-level configuration document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpSecConfig {
    /// Operator-chosen configuration name.
    pub bpsec_config_name: String,
    /// The policy rules; each expands over its bundle-source ×
    /// final-destination cross product.
    #[serde(default)]
    pub policy_rules: Vec<PolicyRuleConfig>,
    /// The named failure event sets the rules reference.
    #[serde(default)]
    pub security_failure_event_sets: Vec<EventSetConfig>,
}

impl BpSecConfig {
    /// Parses a configuration document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or schema
    /// violations (including unknown roles, services, and event ids).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One configured policy rule.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRuleConfig {
    /// Operator-assigned rule identifier.
    pub security_policy_rule_id: u64,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// The role this node plays for the rule.
    pub security_role: SecurityRole,
    /// Wildcard pattern for the security source.
    pub security_source: String,
    /// Wildcard patterns for the bundle source (cross-product element).
    pub bundle_source: Vec<String>,
    /// Wildcard patterns for the final destination (cross-product element).
    pub bundle_final_destination: Vec<String>,
    /// Block types the rule protects.
    pub security_target_block_types: Vec<u8>,
    /// The service to apply.
    pub security_service: SecurityService,
    /// The context family realizing the service.
    pub security_context: SecurityContextKind,
    /// Name of the failure event set governing this rule.
    pub security_failure_event_set_reference: String,
    /// Context parameters.
    #[serde(default)]
    pub security_context_params: Vec<ContextParamConfig>,
}

/// One `{paramName, value}` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextParamConfig {
    /// The parameter name (`aesVariant`, `shaVariant`, `ivSizeBytes`,
    /// `scopeFlags`, `securityBlockCrc`, or `keyFile`).
    pub param_name: String,
    /// The parameter value; numeric except for `keyFile`.
    pub value: serde_json::Value,
}

/// One named failure event set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSetConfig {
    /// The set's name, referenced by rules.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Event-to-actions bindings.
    #[serde(default)]
    pub security_operation_events: Vec<OperationEventConfig>,
}

/// One event binding inside an event set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationEventConfig {
    /// The event being bound.
    pub event_id: SecurityOperationEvent,
    /// The ordered reactions.
    pub actions: Vec<ActionConfig>,
}

/// An action: either a bare name or an object carrying parameters.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    /// `"removeSecurityOperation"` style.
    Name(String),
    /// `{"name": "overrideSopBlockBpcf", "flagValue": 4}` style.
    Detailed {
        /// The action name.
        name: String,
        /// Replacement block-processing-control-flags for the BPCF
        /// override actions.
        #[serde(default, rename = "flagValue")]
        flag_value: Option<u64>,
        /// Reason code for `reportReasonCode`.
        #[serde(default, rename = "reasonCode")]
        reason_code: Option<u64>,
    },
}
