//! Channel profile builder.
//!
//! Turns a [`Profile`] into the channel's root `ConfigGroup`:
//!
//! ```text
//! Channel
//! ├── Orderer      (one group per orderer org)
//! ├── Application  (one group per application org)
//! └── Consortiums
//!     └── <name>   (one group per member org)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use prost::Message;
use tracing::{debug, info};

use crate::error::{ConfigTxError, Result};
use crate::msp::{self, MaterialLoader};
use crate::policy::{self, PolicyValue};
use crate::profile::{
    self, Application, ConsortiumDef, IMPLICIT_META_POLICY_TYPE, Orderer, Organization, PolicyDef,
    Profile, SIGNATURE_POLICY_TYPE, CONSENSUS_TYPE_ETCDRAFT, CONSENSUS_TYPE_KAFKA,
    CONSENSUS_TYPE_SOLO,
};
use crate::proto::common::{ConfigGroup, ImplicitMetaRule};
use crate::proto::orderer::{BatchSize, ConsensusType, etcdraft};
use crate::proto::peer::AnchorPeer;
use crate::tree::{
    self, ADMINS_POLICY_KEY, APPLICATION_GROUP_KEY, CONSORTIUMS_GROUP_KEY,
    ORDERER_ADMINS_POLICY_NAME, ORDERER_GROUP_KEY, ORDERER_POLICIES, STANDARD_POLICIES,
};
use crate::values::{
    DEFAULT_BLOCK_DATA_HASHING_WIDTH, DEFAULT_HASHING_ALGORITHM, StandardValue,
};

/// Build the root channel group described by `profile`.
pub fn new_channel_group(profile: &Profile, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let mut channel = tree::new_group_with_mod_policy(ADMINS_POLICY_KEY);
    add_policies(&mut channel, &profile.policies, ADMINS_POLICY_KEY, &STANDARD_POLICIES)
        .map_err(|e| e.context("error adding policies to channel group"))?;

    StandardValue::HashingAlgorithm(DEFAULT_HASHING_ALGORITHM.to_string())
        .add_to(&mut channel, ADMINS_POLICY_KEY);
    StandardValue::BlockDataHashingStructure(DEFAULT_BLOCK_DATA_HASHING_WIDTH)
        .add_to(&mut channel, ADMINS_POLICY_KEY);
    if let Some(orderer) = profile.orderer.as_ref().filter(|o| !o.addresses.is_empty()) {
        StandardValue::OrdererAddresses(orderer.addresses.clone())
            .add_to(&mut channel, ORDERER_ADMINS_POLICY_NAME);
    }
    if let Some(consortium) = profile.consortium.as_deref().filter(|c| !c.is_empty()) {
        StandardValue::Consortium(consortium.to_string()).add_to(&mut channel, ADMINS_POLICY_KEY);
    }
    if !profile.capabilities.is_empty() {
        capabilities_value(&profile.capabilities).add_to(&mut channel, ADMINS_POLICY_KEY);
    }

    if let Some(orderer) = &profile.orderer {
        channel
            .groups
            .insert(ORDERER_GROUP_KEY.to_string(), new_orderer_group(orderer, loader)?);
    }
    if let Some(app) = &profile.application {
        channel.groups.insert(
            APPLICATION_GROUP_KEY.to_string(),
            new_application_group(app, loader)?,
        );
    }
    if let Some(consortiums) = &profile.consortiums {
        channel.groups.insert(
            CONSORTIUMS_GROUP_KEY.to_string(),
            new_consortiums_group(consortiums, loader)?,
        );
    }

    info!(
        groups = ?channel.groups.keys().collect::<Vec<_>>(),
        values = channel.values.len(),
        "Built channel group"
    );
    Ok(channel)
}

/// Compile each policy definition into `group`, after checking `required`.
pub fn add_policies(
    group: &mut ConfigGroup,
    policies: &BTreeMap<String, PolicyDef>,
    mod_policy: &str,
    required: &[&str],
) -> Result<()> {
    tree::require_policies(policies, required)?;
    for (name, def) in policies {
        let value = match def.policy_type.as_str() {
            IMPLICIT_META_POLICY_TYPE => policy::implicit::parse(&def.rule).map_err(|e| {
                e.context(format!("invalid implicit meta policy rule '{}'", def.rule))
            })?,
            SIGNATURE_POLICY_TYPE => PolicyValue::Signature(policy::compile(&def.rule).map_err(
                |e| e.context(format!("invalid signature policy rule '{}'", def.rule)),
            )?),
            other => {
                return Err(ConfigTxError::validation(format!("unknown policy type: {other}")));
            }
        };
        tree::set_policy(group, name, &value, mod_policy);
    }
    debug!(count = policies.len(), "Added policies");
    Ok(())
}

fn capabilities_value(capabilities: &BTreeMap<String, bool>) -> StandardValue {
    let enabled: BTreeSet<String> = capabilities
        .iter()
        .filter(|(_, on)| **on)
        .map(|(name, _)| name.clone())
        .collect();
    StandardValue::Capabilities(enabled)
}

// ─── Orderer ─────────────────────────────────────────────────────────────────

pub fn new_orderer_group(conf: &Orderer, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let mut group = tree::new_group_with_mod_policy(ADMINS_POLICY_KEY);
    add_policies(&mut group, &conf.policies, ADMINS_POLICY_KEY, &ORDERER_POLICIES)
        .map_err(|e| e.context("error adding policies to orderer group"))?;

    StandardValue::BatchSize(BatchSize {
        max_message_count: conf.batch_size.max_message_count,
        absolute_max_bytes: conf.batch_size.absolute_max_bytes,
        preferred_max_bytes: conf.batch_size.preferred_max_bytes,
    })
    .add_to(&mut group, ADMINS_POLICY_KEY);
    check_duration("batch timeout", &conf.batch_timeout)?;
    StandardValue::BatchTimeout(conf.batch_timeout.clone()).add_to(&mut group, ADMINS_POLICY_KEY);
    StandardValue::ChannelRestrictions(conf.max_channels).add_to(&mut group, ADMINS_POLICY_KEY);
    if !conf.capabilities.is_empty() {
        capabilities_value(&conf.capabilities).add_to(&mut group, ADMINS_POLICY_KEY);
    }

    let metadata = match conf.orderer_type.as_str() {
        CONSENSUS_TYPE_SOLO => vec![],
        CONSENSUS_TYPE_KAFKA => {
            StandardValue::KafkaBrokers(conf.kafka.brokers.clone())
                .add_to(&mut group, ADMINS_POLICY_KEY);
            vec![]
        }
        CONSENSUS_TYPE_ETCDRAFT => raft_metadata(conf, loader)?,
        other => {
            return Err(ConfigTxError::validation(format!("unknown orderer type: {other}")));
        }
    };
    StandardValue::ConsensusType(ConsensusType {
        r#type: conf.orderer_type.clone(),
        metadata,
        state: 0,
    })
    .add_to(&mut group, ADMINS_POLICY_KEY);

    for org in &conf.organizations {
        let org_group = new_orderer_org_group(org, loader)
            .map_err(|e| e.context(format!("failed to create orderer org {}", org.name)))?;
        group.groups.insert(org.name.clone(), org_group);
    }
    Ok(group)
}

fn raft_metadata(conf: &Orderer, loader: &dyn MaterialLoader) -> Result<Vec<u8>> {
    let raft = conf.etcd_raft.as_ref().ok_or_else(|| {
        ConfigTxError::validation(format!(
            "cannot marshal metadata for orderer type {CONSENSUS_TYPE_ETCDRAFT}: no etcd_raft section"
        ))
    })?;
    let mut consenters = Vec::with_capacity(raft.consenters.len());
    for c in &raft.consenters {
        let client_tls_cert = loader.read_file(&c.client_tls_cert).map_err(|e| {
            ConfigTxError::collaborator(
                format!("cannot load client cert for consenter {}:{}", c.host, c.port),
                e,
            )
        })?;
        let server_tls_cert = loader.read_file(&c.server_tls_cert).map_err(|e| {
            ConfigTxError::collaborator(
                format!("cannot load server cert for consenter {}:{}", c.host, c.port),
                e,
            )
        })?;
        consenters.push(etcdraft::Consenter {
            host: c.host.clone(),
            port: c.port,
            client_tls_cert,
            server_tls_cert,
        });
    }
    let options = &raft.options;
    check_duration("tick interval", &options.tick_interval)?;
    Ok(etcdraft::ConfigMetadata {
        consenters,
        options: Some(etcdraft::Options {
            tick_interval: options.tick_interval.clone(),
            election_tick: options.election_tick,
            heartbeat_tick: options.heartbeat_tick,
            max_inflight_blocks: options.max_inflight_blocks,
            snapshot_interval_size: options.snapshot_interval_size,
        }),
    }
    .encode_to_vec())
}

/// Durations travel as strings; reject anything the ordering service could
/// not parse, and zero.
fn check_duration(what: &str, value: &str) -> Result<()> {
    match profile::parse_duration(value) {
        Ok(d) if !d.is_zero() => Ok(()),
        Ok(_) => Err(ConfigTxError::validation(format!(
            "invalid {what} '{value}': must be positive"
        ))),
        Err(e) => Err(ConfigTxError::validation(format!("invalid {what} '{value}': {e}"))),
    }
}

pub fn new_orderer_org_group(org: &Organization, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let Some(mut group) = org_group_with_msp(org, loader)? else {
        return Ok(tree::new_group_with_mod_policy(ADMINS_POLICY_KEY));
    };
    if !org.orderer_endpoints.is_empty() {
        StandardValue::Endpoints(org.orderer_endpoints.clone()).add_to(&mut group, ADMINS_POLICY_KEY);
    }
    Ok(group)
}

// ─── Application ─────────────────────────────────────────────────────────────

pub fn new_application_group(conf: &Application, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let mut group = tree::new_group_with_mod_policy(ADMINS_POLICY_KEY);
    add_policies(&mut group, &conf.policies, ADMINS_POLICY_KEY, &STANDARD_POLICIES)
        .map_err(|e| e.context("error adding policies to application group"))?;

    if !conf.acls.is_empty() {
        StandardValue::Acls(conf.acls.clone()).add_to(&mut group, ADMINS_POLICY_KEY);
    }
    if !conf.capabilities.is_empty() {
        capabilities_value(&conf.capabilities).add_to(&mut group, ADMINS_POLICY_KEY);
    }

    for org in &conf.organizations {
        let org_group = new_application_org_group(org, loader)
            .map_err(|e| e.context(format!("failed to create application org {}", org.name)))?;
        group.groups.insert(org.name.clone(), org_group);
    }
    Ok(group)
}

pub fn new_application_org_group(
    org: &Organization,
    loader: &dyn MaterialLoader,
) -> Result<ConfigGroup> {
    let Some(mut group) = org_group_with_msp(org, loader)? else {
        return Ok(tree::new_group_with_mod_policy(ADMINS_POLICY_KEY));
    };
    // An empty AnchorPeers value would show up as a delta against the
    // consortium's copy of this org when computing channel creation updates.
    if !org.anchor_peers.is_empty() {
        let peers = org
            .anchor_peers
            .iter()
            .map(|p| AnchorPeer {
                host: p.host.clone(),
                port: p.port,
            })
            .collect();
        StandardValue::AnchorPeers(peers).add_to(&mut group, ADMINS_POLICY_KEY);
    }
    Ok(group)
}

// ─── Consortiums ─────────────────────────────────────────────────────────────

pub fn new_consortiums_group(
    consortiums: &BTreeMap<String, ConsortiumDef>,
    loader: &dyn MaterialLoader,
) -> Result<ConfigGroup> {
    let mut group = tree::new_group_with_mod_policy(ORDERER_ADMINS_POLICY_NAME);
    // Only reached through the channel-level implicit meta policies, which
    // leaves the consortiums under the orderer admins' control.
    tree::set_policy(
        &mut group,
        ADMINS_POLICY_KEY,
        &PolicyValue::accept_all(),
        ORDERER_ADMINS_POLICY_NAME,
    );
    for (name, consortium) in consortiums {
        let consortium_group = new_consortium_group(consortium, loader)
            .map_err(|e| e.context(format!("failed to create consortium {name}")))?;
        group.groups.insert(name.clone(), consortium_group);
    }
    Ok(group)
}

pub fn new_consortium_group(conf: &ConsortiumDef, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let mut group = tree::new_group_with_mod_policy(ORDERER_ADMINS_POLICY_NAME);
    for org in &conf.organizations {
        let org_group = org_group_with_msp(org, loader)
            .map_err(|e| e.context(format!("failed to create consortium org {}", org.name)))?
            .unwrap_or_else(|| tree::new_group_with_mod_policy(ADMINS_POLICY_KEY));
        group.groups.insert(org.name.clone(), org_group);
    }
    StandardValue::ChannelCreationPolicy(
        PolicyValue::implicit_meta(ImplicitMetaRule::Any, ADMINS_POLICY_KEY).to_proto(),
    )
    .add_to(&mut group, ORDERER_ADMINS_POLICY_NAME);
    Ok(group)
}

// ─── Organizations ───────────────────────────────────────────────────────────

/// The parts every organization group shares: policies and the `MSP` value.
/// `None` when the organization is foreign to the caller.
fn org_group_with_msp(org: &Organization, loader: &dyn MaterialLoader) -> Result<Option<ConfigGroup>> {
    if org.skip_as_foreign {
        debug!(org = %org.name, "Skipping foreign organization");
        return Ok(None);
    }
    if org.msp_type != msp::BCCSP_MSP_TYPE_NAME {
        return Err(ConfigTxError::validation(format!(
            "unsupported MSP type '{}' for org {}",
            org.msp_type, org.name
        )));
    }

    let material = loader.load_msp(&org.msp_dir, &org.id, &org.msp_type).map_err(|e| {
        ConfigTxError::collaborator(
            format!("error loading MSP configuration for org {}", org.name),
            e,
        )
    })?;
    let msp_config = msp::verifying_msp_config(&org.id, &material)?;

    let mut group = tree::new_group_with_mod_policy(ADMINS_POLICY_KEY);
    add_policies(&mut group, &org.policies, ADMINS_POLICY_KEY, &STANDARD_POLICIES)
        .map_err(|e| e.context(format!("error adding policies to org group {}", org.name)))?;
    StandardValue::Msp(msp_config).add_to(&mut group, ADMINS_POLICY_KEY);

    debug!(org = %org.name, msp_id = %org.id, "Built organization group");
    Ok(Some(group))
}
