//! Config loading error types.

use thiserror::Error;

use crate::context::KeyStoreError;
use crate::policy::PolicyError;

/// Errors that abort a configuration load.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The document is not valid JSON or does not fit the schema.
    #[error("malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A rule's endpoint pattern or role was invalid.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A `paramName` this implementation does not recognize.
    #[error("rule {rule_id}: unknown security context parameter {name:?}")]
    UnknownParam {
        /// The offending rule's id.
        rule_id: u64,
        /// The unrecognized parameter name.
        name: String,
    },

    /// A recognized parameter carried an out-of-range or mistyped value.
    #[error("rule {rule_id}: invalid value for parameter {name:?}")]
    BadParamValue {
        /// The offending rule's id.
        rule_id: u64,
        /// The parameter name.
        name: String,
    },

    /// A rule lacked the mandatory `keyFile` parameter.
    #[error("rule {rule_id}: missing keyFile parameter")]
    MissingKeyFile {
        /// The offending rule's id.
        rule_id: u64,
    },

    /// A key file could not be read at load time.
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// The configured key length does not fit the rule's AES variant.
    #[error("rule {rule_id}: key is {actual} bytes, variant requires {expected}")]
    KeyLength {
        /// The offending rule's id.
        rule_id: u64,
        /// Required key length in bytes.
        expected: usize,
        /// Actual key length in bytes.
        actual: usize,
    },

    /// The rule's service and context family do not belong together.
    #[error("rule {rule_id}: security context does not provide the requested service")]
    ContextMismatch {
        /// The offending rule's id.
        rule_id: u64,
    },

    /// A rule referenced an event set that was never defined.
    #[error("rule {rule_id}: unknown securityFailureEventSetReference {reference:?}")]
    DanglingEventSetReference {
        /// The offending rule's id.
        rule_id: u64,
        /// The missing set's name.
        reference: String,
    },

    /// Two event sets shared a name.
    #[error("duplicate securityFailureEventSet name {name:?}")]
    DuplicateEventSetName {
        /// The repeated name.
        name: String,
    },

    /// An action name this implementation does not recognize.
    #[error("event set {set:?}: unknown action {name:?}")]
    UnknownAction {
        /// The containing event set.
        set: String,
        /// The unrecognized action name.
        name: String,
    },

    /// An action that needs a parameter (the BPCF overrides) lacked it.
    #[error("event set {set:?}: action {name:?} requires a flagValue")]
    MissingActionParam {
        /// The containing event set.
        set: String,
        /// The action name.
        name: String,
    },
}
