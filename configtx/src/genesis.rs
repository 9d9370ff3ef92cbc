//! Genesis blocks and channel creation transactions.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::builder;
use crate::envelope::{self, make_channel_header, make_payload_header, new_signature_header};
use crate::error::{ConfigTxError, Result};
use crate::msp::MaterialLoader;
use crate::profile::Profile;
use crate::proto::common::{
    Block, BlockData, BlockHeader, BlockMetadata, BlockMetadataIndex, Config, ConfigEnvelope,
    ConfigGroup, ConfigUpdate, ConfigUpdateEnvelope, ConfigValue, Envelope, HeaderType, LastConfig,
    Metadata, OrdererBlockMetadata, Payload,
};
use crate::proto::{marshal, unmarshal};
use crate::signer::{self, Signer};
use crate::tree::APPLICATION_GROUP_KEY;
use crate::update;
use crate::values::{CONSORTIUM_KEY, StandardValue};

/// Message version of the genesis channel header.
pub const GENESIS_MSG_VERSION: i32 = 1;
const GENESIS_EPOCH: u64 = 0;
const CREATE_CHANNEL_MSG_VERSION: i32 = 0;
const CREATE_CHANNEL_EPOCH: u64 = 0;

/// Wrap `channel_group` into block 0 of `channel_id`.
pub fn genesis_block(channel_group: &ConfigGroup, channel_id: &str) -> Result<Block> {
    let signature_header = new_signature_header(None)?;
    let mut channel_header =
        make_channel_header(HeaderType::Config, GENESIS_MSG_VERSION, channel_id, GENESIS_EPOCH);
    channel_header.tx_id = signer::compute_tx_id(&signature_header.nonce, &signature_header.creator);

    let config_envelope = ConfigEnvelope {
        config: Some(Config {
            sequence: 0,
            channel_group: Some(channel_group.clone()),
        }),
        last_update: None,
    };
    let payload = Payload {
        header: Some(make_payload_header(&channel_header, &signature_header)),
        data: marshal(&config_envelope),
    };
    let envelope = Envelope {
        payload: marshal(&payload),
        signature: Vec::new(),
    };

    let data = BlockData {
        data: vec![marshal(&envelope)],
    };
    let last_config = LastConfig { index: 0 };
    let mut metadata = vec![Vec::new(); BlockMetadataIndex::COUNT];
    metadata[BlockMetadataIndex::LastConfig as usize] = marshal(&Metadata {
        value: marshal(&last_config),
        signatures: vec![],
    });
    metadata[BlockMetadataIndex::Signatures as usize] = marshal(&Metadata {
        value: marshal(&OrdererBlockMetadata {
            last_config: Some(last_config),
            consenter_metadata: vec![],
        }),
        signatures: vec![],
    });

    let block = Block {
        header: Some(BlockHeader {
            number: 0,
            previous_hash: Vec::new(),
            data_hash: block_data_hash(&data),
        }),
        data: Some(data),
        metadata: Some(BlockMetadata { metadata }),
    };

    info!(channel_id, tx_id = %channel_header.tx_id, "Created genesis block");
    Ok(block)
}

/// Empty block with every metadata slot allocated.
pub fn new_block(number: u64, previous_hash: Vec<u8>) -> Block {
    Block {
        header: Some(BlockHeader {
            number,
            previous_hash,
            data_hash: Vec::new(),
        }),
        data: Some(BlockData::default()),
        metadata: Some(BlockMetadata {
            metadata: vec![Vec::new(); BlockMetadataIndex::COUNT],
        }),
    }
}

/// SHA-256 over the concatenated transaction bytes.
pub fn block_data_hash(data: &BlockData) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for tx in &data.data {
        hasher.update(tx);
    }
    hasher.finalize().to_vec()
}

/// Extract the configuration carried by a configuration block.
pub fn config_from_block(block: &Block) -> Result<Config> {
    let tx = block
        .data
        .as_ref()
        .and_then(|d| d.data.first())
        .ok_or_else(|| ConfigTxError::validation("block contains no transactions"))?;
    let envelope: Envelope = unmarshal(tx)?;
    let (payload, channel_header) = envelope::open_envelope(&envelope)?;
    if channel_header.r#type != HeaderType::Config as i32 {
        return Err(ConfigTxError::validation(format!(
            "block is not a config block: header type {}",
            channel_header.r#type
        )));
    }
    let config_envelope: ConfigEnvelope = unmarshal(&payload.data)?;
    config_envelope
        .config
        .ok_or_else(|| ConfigTxError::validation("config envelope carries no config"))
}

/// The tree a new channel is diffed against: the profile's channel group with
/// the Application group's own values and policies removed.
pub fn default_config_template(profile: &Profile, loader: &dyn MaterialLoader) -> Result<ConfigGroup> {
    let mut channel = builder::new_channel_group(profile, loader)
        .map_err(|e| e.context("error parsing configuration"))?;
    let app = channel.groups.get_mut(APPLICATION_GROUP_KEY).ok_or_else(|| {
        ConfigTxError::validation("channel template configs must contain an application section")
    })?;
    app.values.clear();
    app.policies.clear();
    Ok(channel)
}

/// Update creating `channel_id` as described by `profile`, relative to `template`.
pub fn channel_creation_update(
    channel_id: &str,
    profile: &Profile,
    template: &ConfigGroup,
    loader: &dyn MaterialLoader,
) -> Result<ConfigUpdate> {
    if profile.application.is_none() {
        return Err(ConfigTxError::validation(
            "cannot define a new channel with no Application section",
        ));
    }
    let consortium = profile
        .consortium
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            ConfigTxError::validation("cannot define a new channel with no Consortium value")
        })?;

    let desired = builder::new_channel_group(profile, loader)
        .map_err(|e| e.context("could not turn profile into channel group"))?;
    let mut update = update::compute_group_update(template, &desired)
        .map_err(|e| e.context("could not compute update"))?;
    update.channel_id = channel_id.to_string();

    // The consortium is asserted explicitly, whatever the diff decided.
    if let Some(read_set) = update.read_set.as_mut() {
        read_set.values.insert(
            CONSORTIUM_KEY.to_string(),
            ConfigValue {
                version: 0,
                ..ConfigValue::default()
            },
        );
    }
    if let Some(write_set) = update.write_set.as_mut() {
        write_set.values.insert(
            CONSORTIUM_KEY.to_string(),
            ConfigValue {
                version: 0,
                value: StandardValue::Consortium(consortium.to_string()).encode(),
                mod_policy: String::new(),
            },
        );
    }

    info!(channel_id, consortium, "Computed channel creation update");
    Ok(update)
}

/// Signed `CONFIG_UPDATE` transaction creating `channel_id`.
pub fn make_channel_creation_transaction(
    channel_id: &str,
    signer: Option<&dyn Signer>,
    profile: &Profile,
    loader: &dyn MaterialLoader,
) -> Result<Envelope> {
    let template = default_config_template(profile, loader)?;
    let update = channel_creation_update(channel_id, profile, &template, loader)?;

    let mut update_envelope = ConfigUpdateEnvelope {
        config_update: marshal(&update),
        signatures: vec![],
    };
    if let Some(signer) = signer {
        envelope::sign_config_update(&mut update_envelope, signer)?;
        debug!(channel_id, "Signed channel creation update");
    }

    envelope::create_signed_envelope(
        HeaderType::ConfigUpdate,
        channel_id,
        signer,
        &update_envelope,
        CREATE_CHANNEL_MSG_VERSION,
        CREATE_CHANNEL_EPOCH,
    )
}
