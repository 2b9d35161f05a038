//! Acceptor/verifier processing of received bundles.
//!
//! Processing runs in two passes over the loaded view:
//!
//! 1. a missing-operation scan, fired against the unmutated bundle, which
//!    checks every acceptor/verifier policy whose bundle patterns match for
//!    target blocks no present security block covers;
//! 2. the operation pass, which walks every BIB/BCB, resolves a policy per
//!    contained operation (`Acceptor` first, then `Verifier`), performs the
//!    cryptographic work, and runs the failure-event state machine on every
//!    anomaly.
//!
//! Operations sharing a security block are handled independently: a
//! sibling's failure only affects the rest of the bundle through the
//! actions its event set configures.

use tracing::{debug, warn};

use crate::block::{
    AbstractSecurityBlock, CONFIDENTIALITY_BLOCK_TYPE, INTEGRITY_BLOCK_TYPE, PARAM_AAD_SCOPE_FLAGS,
    PARAM_AES_VARIANT, PARAM_INTEGRITY_SCOPE_FLAGS, PARAM_IV, PARAM_SHA_VARIANT, RESULT_AUTH,
};
use crate::bundle::{BundleView, CanonicalBlock};
use crate::context::{
    aes, mac, AesVariant, CryptoError, ScopeFlags, ShaVariant, BCB_AES_GCM_ID, BIB_HMAC_SHA2_ID,
};
use crate::eid::Eid;
use crate::events::{EventAction, SecurityOperationEvent};
use crate::manager::PolicyManager;
use crate::policy::{Policy, PolicyId, SecurityRole, SecurityService};

use super::context::{PendingReport, ProcessingContext};
use super::error::ProcessError;

/// The security block an operation under scrutiny lives in.
struct CurrentOp<'a> {
    asb: &'a mut AbstractSecurityBlock,
    index: usize,
    sec_block_number: u64,
}

/// Processes every security operation of a received bundle.
///
/// On success the view is left mutated (accepted operations stripped,
/// decrypted targets restored) and re-renderable. [`ProcessError::Drop`]
/// is the only error surfaced; every other anomaly is consumed by the
/// failure-event state machine.
pub(crate) fn process_received(
    manager: &PolicyManager,
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
) -> Result<(), ProcessError> {
    let primary_bytes = view.primary.encode();
    let bundle_source = view.primary.source;
    let bundle_dest = view.primary.destination;
    let mut drop_bundle = false;

    scan_for_missing_operations(manager, view, ctx, bundle_source, bundle_dest, &mut drop_bundle);

    let sec_numbers: Vec<u64> = view
        .blocks()
        .filter(|b| is_security_block(b.block_type))
        .map(|b| b.block_number)
        .collect();

    for sec_number in sec_numbers {
        // An earlier operation's actions may have removed this block.
        let Some(sec_block) = view.block_by_number(sec_number) else {
            continue;
        };
        let sec_type = sec_block.block_type;
        let sec_header = sec_block.header_bytes();
        let mut asb = match AbstractSecurityBlock::decode(&sec_block.data) {
            Ok(asb) => asb,
            Err(error) => {
                warn!(block_number = sec_number, %error, "undecodable security block left in place");
                continue;
            }
        };
        let mut dirty = false;

        let mut index = 0;
        while index < asb.targets.len() {
            let target = asb.targets[index];
            let target_type = view.block_by_number(target).map(|b| b.block_type);
            let Some((policy_id, role)) = resolve_operation_policy(
                manager,
                ctx,
                asb.source,
                bundle_source,
                bundle_dest,
                sec_type,
                target_type,
            ) else {
                // Out of policy: leave the operation in place.
                index += 1;
                continue;
            };
            let policy = manager.store().get(policy_id);

            match run_operation(
                manager,
                view,
                ctx,
                policy,
                role,
                &asb,
                index,
                &sec_header,
                &primary_bytes,
            ) {
                Ok(()) => {
                    debug!(
                        rule_id = policy.rule_id,
                        target,
                        ?role,
                        "security operation verified"
                    );
                    if role == SecurityRole::Acceptor {
                        view.set_encrypted(target, false);
                        asb.remove_operation(index);
                        dirty = true;
                    } else {
                        index += 1;
                    }
                }
                Err(error) => {
                    let event = if error.is_misconfiguration() {
                        SecurityOperationEvent::misconfigured_at(role)
                    } else {
                        SecurityOperationEvent::corrupted_at(role)
                    };
                    warn!(
                        rule_id = policy.rule_id,
                        target,
                        ?role,
                        %error,
                        ?event,
                        "security operation failed"
                    );
                    let removed = execute_actions(
                        manager,
                        view,
                        ctx,
                        policy,
                        event,
                        target,
                        Some(CurrentOp {
                            asb: &mut asb,
                            index,
                            sec_block_number: sec_number,
                        }),
                        &mut drop_bundle,
                    );
                    // An acceptor that cannot recover a confidentiality
                    // target cannot hand the bundle onward.
                    if role == SecurityRole::Acceptor
                        && policy.service == SecurityService::Confidentiality
                    {
                        drop_bundle = true;
                    }
                    if removed {
                        dirty = true;
                    } else {
                        index += 1;
                    }
                }
            }
        }

        if dirty {
            if asb.is_empty() {
                let _ = view.remove_block(sec_number);
            } else if let Some(block) = view.block_mut_by_number(sec_number) {
                block.data = asb.encode();
            }
        }
    }

    if drop_bundle {
        Err(ProcessError::Drop)
    } else {
        Ok(())
    }
}

fn is_security_block(block_type: u8) -> bool {
    block_type == INTEGRITY_BLOCK_TYPE || block_type == CONFIDENTIALITY_BLOCK_TYPE
}

fn service_matches(service: SecurityService, sec_type: u8) -> bool {
    match service {
        SecurityService::Integrity => sec_type == INTEGRITY_BLOCK_TYPE,
        SecurityService::Confidentiality => sec_type == CONFIDENTIALITY_BLOCK_TYPE,
    }
}

/// Resolves the policy governing one received operation: `Acceptor` first,
/// then `Verifier`; within a role the policy must also speak for the
/// block's service and the target's block type.
fn resolve_operation_policy(
    manager: &PolicyManager,
    ctx: &mut ProcessingContext,
    security_source: Eid,
    bundle_source: Eid,
    bundle_dest: Eid,
    sec_type: u8,
    target_type: Option<u8>,
) -> Option<(PolicyId, SecurityRole)> {
    let store = manager.store();
    for role in [SecurityRole::Acceptor, SecurityRole::Verifier] {
        let cache = match role {
            SecurityRole::Acceptor => &mut ctx.acceptor_cache,
            _ => &mut ctx.verifier_cache,
        };
        if let Some(id) =
            store.find_with_cache(security_source, bundle_source, bundle_dest, role, cache)
        {
            let policy = store.get(id);
            let type_ok =
                target_type.is_none_or(|t| policy.target_block_types.contains(&t));
            if service_matches(policy.service, sec_type) && type_ok {
                return Some((id, role));
            }
        }
    }
    None
}

/// Performs the cryptographic work of one operation. Acceptors mutate the
/// target block in place; verifiers work on a scratch copy.
#[allow(clippy::too_many_arguments)]
fn run_operation(
    manager: &PolicyManager,
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    policy: &Policy,
    role: SecurityRole,
    asb: &AbstractSecurityBlock,
    index: usize,
    sec_header: &[u8],
    primary_bytes: &[u8],
) -> Result<(), CryptoError> {
    let target = asb.targets[index];
    let key = manager
        .key_for(policy)
        .ok_or(CryptoError::MissingParameter { name: "keyFile" })?;
    let target_header = view
        .block_by_number(target)
        .map(CanonicalBlock::header_bytes)
        .ok_or(CryptoError::MissingParameter {
            name: "securityTarget",
        })?;

    match asb.context_id {
        BCB_AES_GCM_ID => {
            let variant = match asb.param_u64(PARAM_AES_VARIANT) {
                Some(id) => AesVariant::from_wire_id(id)
                    .ok_or(CryptoError::BadParameter { name: "aesVariant" })?,
                None => policy.params.aes_variant,
            };
            let scope = wire_scope(asb, PARAM_AAD_SCOPE_FLAGS, policy)?;
            let iv = asb
                .param_bytes_for_target(PARAM_IV, index)
                .ok_or(CryptoError::MissingParameter { name: "ivSizeBytes" })?;
            let tag = asb
                .result_bytes(index, RESULT_AUTH)
                .ok_or(CryptoError::MissingParameter {
                    name: "authenticationTag",
                })?;

            ctx.aad.clear();
            let aad = &mut ctx.aad;
            scope.assemble_aad(primary_bytes, &target_header, sec_header, aad);

            if role == SecurityRole::Acceptor {
                let block = view
                    .block_mut_by_number(target)
                    .ok_or(CryptoError::MissingParameter {
                        name: "securityTarget",
                    })?;
                aes::decrypt_in_place(variant, key, iv, &ctx.aad, &mut block.data, tag)
            } else {
                // Verifiers leave the ciphertext in place; authenticate a
                // scratch copy instead.
                let (aad, scratch) = (&ctx.aad, &mut ctx.scratch);
                scratch.clear();
                if let Some(block) = view.block_by_number(target) {
                    scratch.extend_from_slice(&block.data);
                }
                aes::decrypt_in_place(variant, key, iv, aad, scratch, tag)
            }
        }
        BIB_HMAC_SHA2_ID => {
            let variant = match asb.param_u64(PARAM_SHA_VARIANT) {
                Some(id) => ShaVariant::from_wire_id(id)
                    .ok_or(CryptoError::BadParameter { name: "shaVariant" })?,
                None => policy.params.sha_variant,
            };
            let scope = wire_scope(asb, PARAM_INTEGRITY_SCOPE_FLAGS, policy)?;
            let expected = asb
                .result_bytes(index, RESULT_AUTH)
                .ok_or(CryptoError::MissingParameter {
                    name: "expectedHmac",
                })?;

            let (aad, ippt) = (&mut ctx.aad, &mut ctx.ippt);
            scope.assemble_aad(primary_bytes, &target_header, sec_header, aad);
            ippt.clear();
            ippt.extend_from_slice(aad);
            if let Some(block) = view.block_by_number(target) {
                ippt.extend_from_slice(&block.data);
            }
            mac::verify(variant, key, ippt, expected)
        }
        id => Err(CryptoError::UnsupportedContext { id }),
    }
}

fn wire_scope(
    asb: &AbstractSecurityBlock,
    param_id: u64,
    policy: &Policy,
) -> Result<ScopeFlags, CryptoError> {
    match asb.param_u64(param_id) {
        Some(value) => {
            ScopeFlags::from_value(value).ok_or(CryptoError::BadParameter { name: "scopeFlags" })
        }
        None => Ok(policy.params.scope_flags),
    }
}

/// Fires `sopMissing*` for every matching policy whose required target
/// blocks lack a covering security operation. Runs before any mutation so
/// acceptor stripping cannot masquerade as absence.
fn scan_for_missing_operations(
    manager: &PolicyManager,
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    bundle_source: Eid,
    bundle_dest: Eid,
    drop_bundle: &mut bool,
) {
    let targets: Vec<(u64, u8)> = view
        .blocks()
        .filter(|b| !is_security_block(b.block_type))
        .map(|b| (b.block_number, b.block_type))
        .collect();

    for (target, target_type) in targets {
        for role in [SecurityRole::Acceptor, SecurityRole::Verifier] {
            let matching: Vec<PolicyId> = manager
                .store()
                .policies_with_role(role)
                .filter(|(_, p)| {
                    p.bundle_source.matches(bundle_source)
                        && p.bundle_final_dest.matches(bundle_dest)
                        && p.target_block_types.contains(&target_type)
                })
                .map(|(id, _)| id)
                .collect();

            for policy_id in &matching {
                let policy = manager.store().get(*policy_id);
                if operation_covers_target(view, policy, target) {
                    continue;
                }
                let event = SecurityOperationEvent::missing_at(role);
                warn!(
                    rule_id = policy.rule_id,
                    target,
                    ?role,
                    ?event,
                    "required security operation is absent"
                );
                execute_actions(
                    manager, view, ctx, policy, event, target, None, drop_bundle,
                );
            }

            // Acceptor policies take precedence over verifier policies for
            // the same target, mirroring per-operation resolution order.
            if !matching.is_empty() {
                break;
            }
        }
    }
}

/// True when some live security block of the policy's service, from a
/// security source the policy accepts, protects the target.
fn operation_covers_target(view: &BundleView, policy: &Policy, target: u64) -> bool {
    view.blocks()
        .filter(|b| is_security_block(b.block_type) && service_matches(policy.service, b.block_type))
        .any(|b| {
            AbstractSecurityBlock::decode(&b.data).is_ok_and(|asb| {
                policy.security_source.matches(asb.source) && asb.targets.contains(&target)
            })
        })
}

/// Executes the ordered action list configured for an event. Returns true
/// when the current operation was removed from its security block.
#[allow(clippy::too_many_arguments)]
fn execute_actions(
    manager: &PolicyManager,
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    policy: &Policy,
    event: SecurityOperationEvent,
    target: u64,
    mut current: Option<CurrentOp<'_>>,
    drop_bundle: &mut bool,
) -> bool {
    let actions = manager.event_set(policy.event_set).actions_for(event);
    let mut removed = false;

    for action in actions {
        match action {
            EventAction::RemoveSecurityOperation => {
                if let Some(cur) = current.as_mut() {
                    if !removed {
                        cur.asb.remove_operation(cur.index);
                        removed = true;
                    }
                }
            }
            EventAction::RemoveSecurityOperationTargetBlock => {
                let _ = view.remove_block(target);
            }
            EventAction::RemoveAllSecurityTargetOperations => {
                if let Some(cur) = current.as_mut() {
                    while let Some(i) = cur.asb.target_index(target) {
                        cur.asb.remove_operation(i);
                        removed = true;
                    }
                }
                strip_target_operations(
                    view,
                    target,
                    current.as_ref().map(|c| c.sec_block_number),
                );
            }
            EventAction::FailBundleForwarding => {
                *drop_bundle = true;
            }
            EventAction::RequestBundleStorage => {
                ctx.request_storage();
            }
            EventAction::ReportReasonCode(reason_code) => {
                ctx.schedule_report(PendingReport {
                    reason_code: *reason_code,
                    bundle_source: view.primary.source,
                    security_target: target,
                });
            }
            EventAction::OverrideTargetBpcf(flags) => {
                if let Some(block) = view.block_mut_by_number(target) {
                    block.block_flags = *flags;
                }
            }
            EventAction::OverrideSecurityBlockBpcf(flags) => {
                if let Some(cur) = &current {
                    if let Some(block) = view.block_mut_by_number(cur.sec_block_number) {
                        block.block_flags = *flags;
                    }
                }
            }
        }
    }
    removed
}

/// Drops every operation protecting `target` from all security blocks in
/// the view except `skip` (the caller's in-flight block).
fn strip_target_operations(view: &mut BundleView, target: u64, skip: Option<u64>) {
    let sec_numbers: Vec<u64> = view
        .blocks()
        .filter(|b| is_security_block(b.block_type) && Some(b.block_number) != skip)
        .map(|b| b.block_number)
        .collect();

    for number in sec_numbers {
        let Some(block) = view.block_by_number(number) else {
            continue;
        };
        let Ok(mut asb) = AbstractSecurityBlock::decode(&block.data) else {
            continue;
        };
        let mut changed = false;
        while let Some(i) = asb.target_index(target) {
            asb.remove_operation(i);
            changed = true;
        }
        if !changed {
            continue;
        }
        if asb.is_empty() {
            let _ = view.remove_block(number);
        } else if let Some(block) = view.block_mut_by_number(number) {
            block.data = asb.encode();
        }
    }
}
