//! Source-role processing: add security operations to an outgoing bundle.

use ciborium::value::Value;
use rand::RngCore;
use tracing::debug;

use crate::block::{
    AbstractSecurityBlock, CONFIDENTIALITY_BLOCK_TYPE, INTEGRITY_BLOCK_TYPE, PARAM_AAD_SCOPE_FLAGS,
    PARAM_AES_VARIANT, PARAM_INTEGRITY_SCOPE_FLAGS, PARAM_IV, PARAM_SHA_VARIANT, RESULT_AUTH,
};
use crate::bundle::{BundleView, CanonicalBlock};
use crate::context::{aes, mac, CryptoError, BCB_AES_GCM_ID, BIB_HMAC_SHA2_ID};
use crate::eid::Eid;
use crate::manager::PolicyManager;
use crate::policy::{Policy, SecurityRole, SecurityService};

use super::context::ProcessingContext;
use super::error::ProcessError;

/// Applies the matching `Source` policy to an outgoing bundle.
///
/// Returns `Ok(false)` when no policy matches or the policy's target block
/// types are absent from the bundle (the bundle is left untouched), and
/// `Ok(true)` when a security block was added.
pub(crate) fn process_outgoing(
    manager: &PolicyManager,
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    this_node: Eid,
) -> Result<bool, ProcessError> {
    let Some(policy_id) = manager.store().find_with_cache(
        this_node,
        view.primary.source,
        view.primary.destination,
        SecurityRole::Source,
        &mut ctx.source_cache,
    ) else {
        return Ok(false);
    };
    let policy = manager.store().get(policy_id);

    // Collect present target blocks, security blocks excluded: a source
    // policy protects application blocks, not other nodes' BIB/BCBs.
    let mut targets = Vec::new();
    for &block_type in &policy.target_block_types {
        if block_type == INTEGRITY_BLOCK_TYPE || block_type == CONFIDENTIALITY_BLOCK_TYPE {
            continue;
        }
        targets.extend(view.block_numbers_by_type(block_type));
    }
    if targets.is_empty() {
        debug!(rule_id = policy.rule_id, "source policy matched, no target blocks present");
        return Ok(false);
    }

    let key = manager
        .key_for(policy)
        .ok_or(CryptoError::MissingParameter { name: "keyFile" })?;

    let security_block_number = view.next_block_number();
    let security_header = CanonicalBlock::new(
        match policy.service {
            SecurityService::Integrity => INTEGRITY_BLOCK_TYPE,
            SecurityService::Confidentiality => CONFIDENTIALITY_BLOCK_TYPE,
        },
        security_block_number,
        0,
        Vec::new(),
    )
    .header_bytes();
    let primary_bytes = view.primary.encode();

    let asb = match policy.service {
        SecurityService::Confidentiality => {
            apply_bcb(view, ctx, policy, key, this_node, &targets, &primary_bytes, &security_header)?
        }
        SecurityService::Integrity => {
            apply_bib(view, ctx, policy, key, this_node, &targets, &primary_bytes, &security_header)
        }
    };

    let mut block = CanonicalBlock::new(
        match policy.service {
            SecurityService::Integrity => INTEGRITY_BLOCK_TYPE,
            SecurityService::Confidentiality => CONFIDENTIALITY_BLOCK_TYPE,
        },
        0,
        0,
        asb.encode(),
    );
    block.crc_type = policy.params.security_block_crc;
    let assigned = view.insert_block(block);
    debug_assert_eq!(assigned, security_block_number);
    debug!(
        rule_id = policy.rule_id,
        block_number = assigned,
        targets = targets.len(),
        "security block added"
    );
    Ok(true)
}

/// Encrypts every target in place and assembles the BCB.
#[allow(clippy::too_many_arguments)]
fn apply_bcb(
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    policy: &Policy,
    key: &[u8],
    this_node: Eid,
    targets: &[u64],
    primary_bytes: &[u8],
    security_header: &[u8],
) -> Result<AbstractSecurityBlock, ProcessError> {
    let scope = policy.params.scope_flags;
    let mut asb = AbstractSecurityBlock::new(BCB_AES_GCM_ID, this_node);

    for &target in targets {
        let target_header = view
            .block_by_number(target)
            .map(CanonicalBlock::header_bytes)
            .unwrap_or_default();
        scope.assemble_aad(primary_bytes, &target_header, security_header, &mut ctx.aad);

        ctx.iv.resize(policy.params.iv_size_bytes, 0);
        rand::thread_rng().fill_bytes(&mut ctx.iv);

        let Some(block) = view.block_mut_by_number(target) else {
            continue;
        };
        let tag = aes::encrypt_in_place(
            policy.params.aes_variant,
            key,
            &ctx.iv,
            &ctx.aad,
            &mut block.data,
        )?;
        view.set_encrypted(target, true);

        asb.targets.push(target);
        asb.parameters
            .push((PARAM_IV, Value::Bytes(ctx.iv.clone())));
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(tag.to_vec()))]);
    }

    asb.parameters.push((
        PARAM_AES_VARIANT,
        Value::from(policy.params.aes_variant.wire_id()),
    ));
    asb.parameters
        .push((PARAM_AAD_SCOPE_FLAGS, Value::from(u64::from(scope.value()))));
    Ok(asb)
}

/// MACs every target and assembles the BIB.
#[allow(clippy::too_many_arguments)]
fn apply_bib(
    view: &mut BundleView,
    ctx: &mut ProcessingContext,
    policy: &Policy,
    key: &[u8],
    this_node: Eid,
    targets: &[u64],
    primary_bytes: &[u8],
    security_header: &[u8],
) -> AbstractSecurityBlock {
    let scope = policy.params.scope_flags;
    let mut asb = AbstractSecurityBlock::new(BIB_HMAC_SHA2_ID, this_node);
    asb.parameters.push((
        PARAM_SHA_VARIANT,
        Value::from(policy.params.sha_variant.wire_id()),
    ));
    asb.parameters.push((
        PARAM_INTEGRITY_SCOPE_FLAGS,
        Value::from(u64::from(scope.value())),
    ));

    for &target in targets {
        let Some(block) = view.block_by_number(target) else {
            continue;
        };
        let target_header = block.header_bytes();
        scope.assemble_aad(primary_bytes, &target_header, security_header, &mut ctx.aad);

        ctx.ippt.clear();
        ctx.ippt.extend_from_slice(&ctx.aad);
        ctx.ippt.extend_from_slice(&block.data);
        let digest = mac::compute(policy.params.sha_variant, key, &ctx.ippt);

        asb.targets.push(target);
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(digest))]);
    }
    asb
}
