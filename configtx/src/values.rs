//! Well-known configuration values.
//!
//! The set of value names the network understands is fixed, so each one is a
//! variant here and its payload type follows from the name.

use std::collections::{BTreeMap, BTreeSet};

use prost::Message;
use serde_json::{Value as Json, json};

use crate::error::{ConfigTxError, Result};
use crate::policy::PolicyValue;
use crate::proto::common::{
    BlockDataHashingStructure, Capabilities, Capability, ConfigGroup, Consortium, Endpoints,
    HashingAlgorithm, OrdererAddresses, Policy,
};
use crate::proto::msp::{FabricMspConfig, MspConfig};
use crate::proto::orderer::{BatchSize, BatchTimeout, ChannelRestrictions, ConsensusType, KafkaBrokers};
use crate::proto::peer::{Acls, AnchorPeer, AnchorPeers, ApiResource};
use crate::tree;

pub const HASHING_ALGORITHM_KEY: &str = "HashingAlgorithm";
pub const BLOCK_DATA_HASHING_STRUCTURE_KEY: &str = "BlockDataHashingStructure";
pub const ORDERER_ADDRESSES_KEY: &str = "OrdererAddresses";
pub const CONSORTIUM_KEY: &str = "Consortium";
pub const CAPABILITIES_KEY: &str = "Capabilities";
pub const BATCH_SIZE_KEY: &str = "BatchSize";
pub const BATCH_TIMEOUT_KEY: &str = "BatchTimeout";
pub const CHANNEL_RESTRICTIONS_KEY: &str = "ChannelRestrictions";
pub const CONSENSUS_TYPE_KEY: &str = "ConsensusType";
pub const KAFKA_BROKERS_KEY: &str = "KafkaBrokers";
pub const MSP_KEY: &str = "MSP";
pub const ANCHOR_PEERS_KEY: &str = "AnchorPeers";
pub const ENDPOINTS_KEY: &str = "Endpoints";
pub const ACLS_KEY: &str = "ACLs";
pub const CHANNEL_CREATION_POLICY_KEY: &str = "ChannelCreationPolicy";

pub const DEFAULT_HASHING_ALGORITHM: &str = "SHA256";
pub const DEFAULT_BLOCK_DATA_HASHING_WIDTH: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq)]
pub enum StandardValue {
    HashingAlgorithm(String),
    BlockDataHashingStructure(u32),
    OrdererAddresses(Vec<String>),
    Consortium(String),
    Capabilities(BTreeSet<String>),
    BatchSize(BatchSize),
    BatchTimeout(String),
    ChannelRestrictions(u64),
    ConsensusType(ConsensusType),
    KafkaBrokers(Vec<String>),
    Msp(MspConfig),
    AnchorPeers(Vec<AnchorPeer>),
    Endpoints(Vec<String>),
    /// API resource name → policy reference.
    Acls(BTreeMap<String, String>),
    ChannelCreationPolicy(Policy),
}

impl StandardValue {
    pub fn key(&self) -> &'static str {
        match self {
            StandardValue::HashingAlgorithm(_) => HASHING_ALGORITHM_KEY,
            StandardValue::BlockDataHashingStructure(_) => BLOCK_DATA_HASHING_STRUCTURE_KEY,
            StandardValue::OrdererAddresses(_) => ORDERER_ADDRESSES_KEY,
            StandardValue::Consortium(_) => CONSORTIUM_KEY,
            StandardValue::Capabilities(_) => CAPABILITIES_KEY,
            StandardValue::BatchSize(_) => BATCH_SIZE_KEY,
            StandardValue::BatchTimeout(_) => BATCH_TIMEOUT_KEY,
            StandardValue::ChannelRestrictions(_) => CHANNEL_RESTRICTIONS_KEY,
            StandardValue::ConsensusType(_) => CONSENSUS_TYPE_KEY,
            StandardValue::KafkaBrokers(_) => KAFKA_BROKERS_KEY,
            StandardValue::Msp(_) => MSP_KEY,
            StandardValue::AnchorPeers(_) => ANCHOR_PEERS_KEY,
            StandardValue::Endpoints(_) => ENDPOINTS_KEY,
            StandardValue::Acls(_) => ACLS_KEY,
            StandardValue::ChannelCreationPolicy(_) => CHANNEL_CREATION_POLICY_KEY,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            StandardValue::HashingAlgorithm(name) => HashingAlgorithm { name: name.clone() }.encode_to_vec(),
            StandardValue::BlockDataHashingStructure(width) => {
                BlockDataHashingStructure { width: *width }.encode_to_vec()
            }
            StandardValue::OrdererAddresses(addresses) => OrdererAddresses {
                addresses: addresses.clone(),
            }
            .encode_to_vec(),
            StandardValue::Consortium(name) => Consortium { name: name.clone() }.encode_to_vec(),
            StandardValue::Capabilities(names) => Capabilities {
                capabilities: names.iter().map(|n| (n.clone(), Capability {})).collect(),
            }
            .encode_to_vec(),
            StandardValue::BatchSize(size) => size.encode_to_vec(),
            StandardValue::BatchTimeout(timeout) => BatchTimeout {
                timeout: timeout.clone(),
            }
            .encode_to_vec(),
            StandardValue::ChannelRestrictions(max_count) => ChannelRestrictions {
                max_count: *max_count,
            }
            .encode_to_vec(),
            StandardValue::ConsensusType(ct) => ct.encode_to_vec(),
            StandardValue::KafkaBrokers(brokers) => KafkaBrokers {
                brokers: brokers.clone(),
            }
            .encode_to_vec(),
            StandardValue::Msp(msp) => msp.encode_to_vec(),
            StandardValue::AnchorPeers(peers) => AnchorPeers {
                anchor_peers: peers.clone(),
            }
            .encode_to_vec(),
            StandardValue::Endpoints(addresses) => Endpoints {
                addresses: addresses.clone(),
            }
            .encode_to_vec(),
            StandardValue::Acls(acls) => Acls {
                acls: acls
                    .iter()
                    .map(|(api, policy_ref)| {
                        (api.clone(), ApiResource { policy_ref: policy_ref.clone() })
                    })
                    .collect(),
            }
            .encode_to_vec(),
            StandardValue::ChannelCreationPolicy(policy) => policy.encode_to_vec(),
        }
    }

    /// Decode the payload stored under `key`.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        Ok(match key {
            HASHING_ALGORITHM_KEY => StandardValue::HashingAlgorithm(HashingAlgorithm::decode(bytes)?.name),
            BLOCK_DATA_HASHING_STRUCTURE_KEY => {
                StandardValue::BlockDataHashingStructure(BlockDataHashingStructure::decode(bytes)?.width)
            }
            ORDERER_ADDRESSES_KEY => StandardValue::OrdererAddresses(OrdererAddresses::decode(bytes)?.addresses),
            CONSORTIUM_KEY => StandardValue::Consortium(Consortium::decode(bytes)?.name),
            CAPABILITIES_KEY => StandardValue::Capabilities(
                Capabilities::decode(bytes)?.capabilities.into_keys().collect(),
            ),
            BATCH_SIZE_KEY => StandardValue::BatchSize(BatchSize::decode(bytes)?),
            BATCH_TIMEOUT_KEY => StandardValue::BatchTimeout(BatchTimeout::decode(bytes)?.timeout),
            CHANNEL_RESTRICTIONS_KEY => {
                StandardValue::ChannelRestrictions(ChannelRestrictions::decode(bytes)?.max_count)
            }
            CONSENSUS_TYPE_KEY => StandardValue::ConsensusType(ConsensusType::decode(bytes)?),
            KAFKA_BROKERS_KEY => StandardValue::KafkaBrokers(KafkaBrokers::decode(bytes)?.brokers),
            MSP_KEY => StandardValue::Msp(MspConfig::decode(bytes)?),
            ANCHOR_PEERS_KEY => StandardValue::AnchorPeers(AnchorPeers::decode(bytes)?.anchor_peers),
            ENDPOINTS_KEY => StandardValue::Endpoints(Endpoints::decode(bytes)?.addresses),
            ACLS_KEY => StandardValue::Acls(
                Acls::decode(bytes)?
                    .acls
                    .into_iter()
                    .map(|(api, res)| (api, res.policy_ref))
                    .collect(),
            ),
            CHANNEL_CREATION_POLICY_KEY => StandardValue::ChannelCreationPolicy(Policy::decode(bytes)?),
            other => {
                return Err(ConfigTxError::validation(format!(
                    "unknown configuration value '{other}'"
                )));
            }
        })
    }

    /// Store this value in `group` under its well-known name.
    pub fn add_to(&self, group: &mut ConfigGroup, mod_policy: &str) {
        tree::set_value(group, self.key(), self.encode(), mod_policy);
    }

    /// JSON view for inspection output.
    pub fn to_json(&self) -> Json {
        match self {
            StandardValue::HashingAlgorithm(name) => json!({ "name": name }),
            StandardValue::BlockDataHashingStructure(width) => json!({ "width": width }),
            StandardValue::OrdererAddresses(addresses) => json!({ "addresses": addresses }),
            StandardValue::Consortium(name) => json!({ "name": name }),
            StandardValue::Capabilities(names) => json!({ "capabilities": names }),
            StandardValue::BatchSize(size) => json!({
                "max_message_count": size.max_message_count,
                "absolute_max_bytes": size.absolute_max_bytes,
                "preferred_max_bytes": size.preferred_max_bytes,
            }),
            StandardValue::BatchTimeout(timeout) => json!({ "timeout": timeout }),
            StandardValue::ChannelRestrictions(max_count) => json!({ "max_count": max_count }),
            StandardValue::ConsensusType(ct) => json!({
                "type": ct.r#type,
                "metadata": hex::encode(&ct.metadata),
                "state": ct.state,
            }),
            StandardValue::KafkaBrokers(brokers) => json!({ "brokers": brokers }),
            StandardValue::Msp(msp) => match FabricMspConfig::decode(msp.config.as_slice()) {
                Ok(fabric) => json!({
                    "type": msp.r#type,
                    "name": fabric.name,
                    "root_certs": fabric.root_certs.len(),
                    "intermediate_certs": fabric.intermediate_certs.len(),
                    "admins": fabric.admins.len(),
                    "tls_root_certs": fabric.tls_root_certs.len(),
                    "node_ous": fabric.fabric_node_ous.is_some_and(|ous| ous.enable),
                }),
                Err(_) => json!({ "type": msp.r#type, "config": hex::encode(&msp.config) }),
            },
            StandardValue::AnchorPeers(peers) => json!({
                "anchor_peers": peers
                    .iter()
                    .map(|p| json!({ "host": p.host, "port": p.port }))
                    .collect::<Vec<_>>(),
            }),
            StandardValue::Endpoints(addresses) => json!({ "addresses": addresses }),
            StandardValue::Acls(acls) => json!({ "acls": acls }),
            StandardValue::ChannelCreationPolicy(policy) => match PolicyValue::from_proto(policy)
                .and_then(|p| p.render())
            {
                Ok(rendered) => json!({ "policy": rendered }),
                Err(_) => json!({ "type": policy.r#type, "value": hex::encode(&policy.value) }),
            },
        }
    }
}
