//! Populates a policy manager from a parsed configuration.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::bundle::CrcType;
use crate::context::{AesVariant, ScopeFlags, SecurityContextParams, ShaVariant};
use crate::events::{EventAction, FailureEventSet};
use crate::manager::PolicyManager;
use crate::policy::{SecurityContextKind, SecurityService};

use super::error::ConfigError;
use super::schema::{ActionConfig, BpSecConfig, PolicyRuleConfig};

/// Loads event sets and policy rules into the manager, validating
/// everything that can be validated before the first bundle arrives.
pub(crate) fn load(manager: &mut PolicyManager, config: &BpSecConfig) -> Result<(), ConfigError> {
    for set_config in &config.security_failure_event_sets {
        if manager.event_set_by_name(&set_config.name).is_some() {
            return Err(ConfigError::DuplicateEventSetName {
                name: set_config.name.clone(),
            });
        }
        let mut set = FailureEventSet::new(&set_config.name, &set_config.description);
        for binding in &set_config.security_operation_events {
            let actions = binding
                .actions
                .iter()
                .map(|a| parse_action(&set_config.name, a))
                .collect::<Result<Vec<_>, _>>()?;
            set.bind(binding.event_id, actions);
        }
        manager.push_event_set(set);
    }

    for rule in &config.policy_rules {
        check_context_coherence(rule)?;
        let event_set = manager
            .event_set_by_name(&rule.security_failure_event_set_reference)
            .ok_or_else(|| ConfigError::DanglingEventSetReference {
                rule_id: rule.security_policy_rule_id,
                reference: rule.security_failure_event_set_reference.clone(),
            })?;

        let params = parse_params(rule)?;
        let Some(key_file) = params.key_file.clone() else {
            return Err(ConfigError::MissingKeyFile {
                rule_id: rule.security_policy_rule_id,
            });
        };
        manager.load_key(&key_file)?;
        check_source_key_length(manager, rule, &params)?;

        for bundle_source in &rule.bundle_source {
            for bundle_final_dest in &rule.bundle_final_destination {
                let (id, is_new) = manager.create_or_get_policy(
                    &rule.security_source,
                    bundle_source,
                    bundle_final_dest,
                    rule.security_role,
                )?;
                if !is_new {
                    warn!(
                        rule_id = rule.security_policy_rule_id,
                        security_source = %rule.security_source,
                        %bundle_source,
                        %bundle_final_dest,
                        "rule re-defines an existing policy key; overwriting"
                    );
                }
                let policy = manager.store_mut().get_mut(id);
                policy.rule_id = rule.security_policy_rule_id;
                policy.description.clone_from(&rule.description);
                policy.target_block_types =
                    rule.security_target_block_types.iter().copied().collect();
                policy.service = rule.security_service;
                policy.context = rule.security_context;
                policy.params = params.clone();
                policy.event_set = event_set;
            }
        }
    }

    for (a, b) in manager.store().incomparable_pairs() {
        let pa = manager.store().get(a);
        let pb = manager.store().get(b);
        warn!(
            rule_a = pa.rule_id,
            rule_b = pb.rule_id,
            "policies overlap without a specificity order; matching will tie-break deterministically"
        );
    }

    info!(
        config_name = %config.bpsec_config_name,
        policies = manager.store().len(),
        event_sets = config.security_failure_event_sets.len(),
        "BPSec policy configuration loaded"
    );
    Ok(())
}

/// `confidentiality` must ride on `aesGcm`, `integrity` on `hmacSha`.
fn check_context_coherence(rule: &PolicyRuleConfig) -> Result<(), ConfigError> {
    let coherent = matches!(
        (rule.security_service, rule.security_context),
        (SecurityService::Confidentiality, SecurityContextKind::AesGcm)
            | (SecurityService::Integrity, SecurityContextKind::HmacSha)
    );
    if coherent {
        Ok(())
    } else {
        Err(ConfigError::ContextMismatch {
            rule_id: rule.security_policy_rule_id,
        })
    }
}

/// A source encrypts with its own configured variant, so its key length is
/// checkable now; acceptors and verifiers take the variant from the wire
/// and are checked at run time.
fn check_source_key_length(
    manager: &PolicyManager,
    rule: &PolicyRuleConfig,
    params: &SecurityContextParams,
) -> Result<(), ConfigError> {
    use crate::policy::SecurityRole;

    if rule.security_role != SecurityRole::Source
        || rule.security_service != SecurityService::Confidentiality
    {
        return Ok(());
    }
    let Some(path) = params.key_file.as_deref() else {
        return Ok(());
    };
    let Some(key) = manager_key_len(manager, path) else {
        return Ok(());
    };
    let expected = params.aes_variant.key_len();
    if key == expected {
        Ok(())
    } else {
        Err(ConfigError::KeyLength {
            rule_id: rule.security_policy_rule_id,
            expected,
            actual: key,
        })
    }
}

fn manager_key_len(manager: &PolicyManager, path: &std::path::Path) -> Option<usize> {
    manager.key_bytes(path).map(<[u8]>::len)
}

fn parse_params(rule: &PolicyRuleConfig) -> Result<SecurityContextParams, ConfigError> {
    let rule_id = rule.security_policy_rule_id;
    let mut params = SecurityContextParams::default();

    for entry in &rule.security_context_params {
        let name = entry.param_name.as_str();
        let bad = || ConfigError::BadParamValue {
            rule_id,
            name: name.to_string(),
        };
        match name {
            "aesVariant" => {
                let value = entry.value.as_u64().ok_or_else(bad)?;
                params.aes_variant = AesVariant::from_config_value(value).ok_or_else(bad)?;
            }
            "shaVariant" => {
                let value = entry.value.as_u64().ok_or_else(bad)?;
                params.sha_variant = ShaVariant::from_config_value(value).ok_or_else(bad)?;
            }
            "ivSizeBytes" => {
                let value = entry.value.as_u64().ok_or_else(bad)?;
                if value == 0 {
                    return Err(bad());
                }
                params.iv_size_bytes = usize::try_from(value).map_err(|_| bad())?;
            }
            "scopeFlags" => {
                let value = entry.value.as_u64().ok_or_else(bad)?;
                params.scope_flags = ScopeFlags::from_value(value).ok_or_else(bad)?;
            }
            "securityBlockCrc" => {
                let value = entry.value.as_u64().ok_or_else(bad)?;
                params.security_block_crc = CrcType::from_config_value(value).ok_or_else(bad)?;
            }
            "keyFile" => {
                let value = entry.value.as_str().ok_or_else(bad)?;
                params.key_file = Some(PathBuf::from(value));
            }
            _ => {
                return Err(ConfigError::UnknownParam {
                    rule_id,
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(params)
}

fn parse_action(set_name: &str, action: &ActionConfig) -> Result<EventAction, ConfigError> {
    let (name, flag_value, reason_code) = match action {
        ActionConfig::Name(name) => (name.as_str(), None, None),
        ActionConfig::Detailed {
            name,
            flag_value,
            reason_code,
        } => (name.as_str(), *flag_value, *reason_code),
    };

    let missing_param = || ConfigError::MissingActionParam {
        set: set_name.to_string(),
        name: name.to_string(),
    };
    match name {
        "removeSecurityOperation" => Ok(EventAction::RemoveSecurityOperation),
        "removeSecurityOperationTargetBlock" => {
            Ok(EventAction::RemoveSecurityOperationTargetBlock)
        }
        "removeAllSecurityTargetOperations" => Ok(EventAction::RemoveAllSecurityTargetOperations),
        "failBundleForwarding" => Ok(EventAction::FailBundleForwarding),
        "requestBundleStorage" => Ok(EventAction::RequestBundleStorage),
        "reportReasonCode" => Ok(EventAction::ReportReasonCode(reason_code.unwrap_or(0))),
        "overrideSecurityTargetBlockBpcf" => flag_value
            .map(EventAction::OverrideTargetBpcf)
            .ok_or_else(missing_param),
        "overrideSopBlockBpcf" => flag_value
            .map(EventAction::OverrideSecurityBlockBpcf)
            .ok_or_else(missing_param),
        _ => Err(ConfigError::UnknownAction {
            set: set_name.to_string(),
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::policy::SecurityRole;

    use super::*;

    fn key_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    fn minimal_config(key_path: &str, extra_params: &str) -> String {
        format!(
            r#"{{
                "bpsecConfigName": "test",
                "policyRules": [{{
                    "securityPolicyRuleId": 7,
                    "securityRole": "acceptor",
                    "securitySource": "ipn:10.1",
                    "bundleSource": ["ipn:1.*", "ipn:2.*"],
                    "bundleFinalDestination": ["ipn:3.*", "ipn:4.*"],
                    "securityTargetBlockTypes": [1],
                    "securityService": "confidentiality",
                    "securityContext": "aesGcm",
                    "securityFailureEventSetReference": "events",
                    "securityContextParams": [
                        {{"paramName": "keyFile", "value": "{key_path}"}}{extra_params}
                    ]
                }}],
                "securityFailureEventSets": [{{
                    "name": "events",
                    "securityOperationEvents": [{{
                        "eventId": "sopCorruptedAtAcceptor",
                        "actions": ["removeSecurityOperation"]
                    }}]
                }}]
            }}"#
        )
    }

    #[test]
    fn rules_expand_over_the_cross_product() {
        let key = key_file(&[1; 32]);
        let config =
            BpSecConfig::from_json(&minimal_config(&key.path().display().to_string(), "")).unwrap();
        let mut manager = PolicyManager::new();
        manager.load_from_config(&config).unwrap();

        assert_eq!(manager.store().len(), 4);
        let policies: Vec<_> = manager
            .store()
            .policies_with_role(SecurityRole::Acceptor)
            .collect();
        assert!(policies.iter().all(|(_, p)| p.rule_id == 7));
        assert!(policies
            .iter()
            .all(|(_, p)| p.target_block_types.contains(&1)));
    }

    #[test]
    fn dangling_event_set_reference_aborts_load() {
        let key = key_file(&[1; 32]);
        let text = minimal_config(&key.path().display().to_string(), "")
            .replace("\"securityFailureEventSetReference\": \"events\"",
                "\"securityFailureEventSetReference\": \"nonexistent\"");
        let config = BpSecConfig::from_json(&text).unwrap();
        let mut manager = PolicyManager::new();
        assert!(matches!(
            manager.load_from_config(&config),
            Err(ConfigError::DanglingEventSetReference { rule_id: 7, .. })
        ));
    }

    #[test]
    fn unknown_and_out_of_range_params_abort_load() {
        let key = key_file(&[1; 32]);
        let path = key.path().display().to_string();

        let text = minimal_config(&path, r#", {"paramName": "nonceBytes", "value": 1}"#);
        let config = BpSecConfig::from_json(&text).unwrap();
        assert!(matches!(
            PolicyManager::new().load_from_config(&config),
            Err(ConfigError::UnknownParam { .. })
        ));

        for bad in [
            r#", {"paramName": "scopeFlags", "value": 8}"#,
            r#", {"paramName": "ivSizeBytes", "value": 0}"#,
            r#", {"paramName": "aesVariant", "value": 192}"#,
            r#", {"paramName": "securityBlockCrc", "value": 8}"#,
        ] {
            let config = BpSecConfig::from_json(&minimal_config(&path, bad)).unwrap();
            assert!(
                matches!(
                    PolicyManager::new().load_from_config(&config),
                    Err(ConfigError::BadParamValue { .. })
                ),
                "expected rejection of {bad}"
            );
        }
    }

    #[test]
    fn missing_key_file_aborts_load() {
        let text = minimal_config("/nonexistent/path.key", "");
        let config = BpSecConfig::from_json(&text).unwrap();
        assert!(matches!(
            PolicyManager::new().load_from_config(&config),
            Err(ConfigError::KeyStore(_))
        ));
    }

    #[test]
    fn source_key_length_is_checked_at_load() {
        let short_key = key_file(&[1; 16]);
        let text = minimal_config(&short_key.path().display().to_string(), "")
            .replace("\"securityRole\": \"acceptor\"", "\"securityRole\": \"source\"");
        let config = BpSecConfig::from_json(&text).unwrap();
        assert!(matches!(
            PolicyManager::new().load_from_config(&config),
            Err(ConfigError::KeyLength {
                rule_id: 7,
                expected: 32,
                actual: 16,
            })
        ));
    }

    #[test]
    fn service_context_mismatch_aborts_load() {
        let key = key_file(&[1; 32]);
        let text = minimal_config(&key.path().display().to_string(), "")
            .replace("\"securityContext\": \"aesGcm\"", "\"securityContext\": \"hmacSha\"");
        let config = BpSecConfig::from_json(&text).unwrap();
        assert!(matches!(
            PolicyManager::new().load_from_config(&config),
            Err(ConfigError::ContextMismatch { rule_id: 7 })
        ));
    }

    #[test]
    fn bpcf_overrides_require_flag_values() {
        let key = key_file(&[1; 32]);
        let text = minimal_config(&key.path().display().to_string(), "").replace(
            "\"removeSecurityOperation\"",
            "\"overrideSopBlockBpcf\"",
        );
        let config = BpSecConfig::from_json(&text).unwrap();
        assert!(matches!(
            PolicyManager::new().load_from_config(&config),
            Err(ConfigError::MissingActionParam { .. })
        ));
    }
}
