//! Declarative channel profiles.
//!
//! A configuration document holds named profiles plus a shared list of
//! organizations. Profile sections may list an organization inline or refer to
//! a shared one by name:
//!
//! ```toml
//! [[organizations]]
//! name = "Org1"
//! id = "Org1MSP"
//! msp_dir = "crypto/org1/msp"
//!
//! [profiles.TwoOrgsChannel]
//! consortium = "SampleConsortium"
//! [profiles.TwoOrgsChannel.application]
//! organizations = ["Org1"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigTxError, Result};

pub const IMPLICIT_META_POLICY_TYPE: &str = "ImplicitMeta";
pub const SIGNATURE_POLICY_TYPE: &str = "Signature";

pub const CONSENSUS_TYPE_SOLO: &str = "solo";
pub const CONSENSUS_TYPE_KAFKA: &str = "kafka";
pub const CONSENSUS_TYPE_ETCDRAFT: &str = "etcdraft";

/// Root of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopLevel {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub consortium: Option<String>,
    #[serde(default)]
    pub application: Option<Application>,
    #[serde(default)]
    pub orderer: Option<Orderer>,
    #[serde(default)]
    pub consortiums: Option<BTreeMap<String, ConsortiumDef>>,
    /// Capability name → enabled.
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyDef {
    #[serde(rename = "type")]
    pub policy_type: String,
    pub rule: String,
}

impl PolicyDef {
    pub fn implicit_meta(rule: &str) -> Self {
        PolicyDef {
            policy_type: IMPLICIT_META_POLICY_TYPE.to_string(),
            rule: rule.to_string(),
        }
    }

    pub fn signature(rule: &str) -> Self {
        PolicyDef {
            policy_type: SIGNATURE_POLICY_TYPE.to_string(),
            rule: rule.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDef>,
    /// API resource → policy reference.
    #[serde(default)]
    pub acls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Orderer {
    #[serde(default = "default_orderer_type")]
    pub orderer_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout: String,
    #[serde(default)]
    pub batch_size: BatchSizeDef,
    #[serde(default)]
    pub kafka: KafkaDef,
    #[serde(default)]
    pub etcd_raft: Option<EtcdRaftDef>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    /// Maximum channels the ordering service admits; 0 means unbounded.
    #[serde(default)]
    pub max_channels: u64,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyDef>,
}

impl Default for Orderer {
    fn default() -> Self {
        Orderer {
            orderer_type: default_orderer_type(),
            addresses: vec![],
            batch_timeout: default_batch_timeout(),
            batch_size: BatchSizeDef::default(),
            kafka: KafkaDef::default(),
            etcd_raft: None,
            organizations: vec![],
            max_channels: 0,
            capabilities: BTreeMap::new(),
            policies: BTreeMap::new(),
        }
    }
}

fn default_orderer_type() -> String {
    CONSENSUS_TYPE_SOLO.to_string()
}

fn default_batch_timeout() -> String {
    "2s".to_string()
}

/// Parse a duration such as `2s`, `500ms` or `1m30s`.
///
/// Each component is a decimal number followed by one of `ns`, `us`, `µs`,
/// `ms`, `s`, `m`, `h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    let mut rest = s;
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_end);
        if num.is_empty() || num == "." {
            return Err(format!("expected a number at '{rest}'"));
        }
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit after '{num}'")),
            other => return Err(format!("unknown unit '{other}'")),
        };
        let value: f64 = num.parse().map_err(|_| format!("invalid number '{num}'"))?;
        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
        rest = tail;
    }
    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchSizeDef {
    #[serde(default = "default_max_message_count")]
    pub max_message_count: u32,
    #[serde(default = "default_absolute_max_bytes")]
    pub absolute_max_bytes: u32,
    #[serde(default = "default_preferred_max_bytes")]
    pub preferred_max_bytes: u32,
}

impl Default for BatchSizeDef {
    fn default() -> Self {
        BatchSizeDef {
            max_message_count: default_max_message_count(),
            absolute_max_bytes: default_absolute_max_bytes(),
            preferred_max_bytes: default_preferred_max_bytes(),
        }
    }
}

fn default_max_message_count() -> u32 {
    500
}

fn default_absolute_max_bytes() -> u32 {
    10 * 1024 * 1024
}

fn default_preferred_max_bytes() -> u32 {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KafkaDef {
    #[serde(default)]
    pub brokers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EtcdRaftDef {
    #[serde(default)]
    pub consenters: Vec<ConsenterDef>,
    #[serde(default)]
    pub options: RaftOptionsDef,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsenterDef {
    pub host: String,
    pub port: u32,
    pub client_tls_cert: PathBuf,
    pub server_tls_cert: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RaftOptionsDef {
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,
    #[serde(default = "default_election_tick")]
    pub election_tick: u32,
    #[serde(default = "default_heartbeat_tick")]
    pub heartbeat_tick: u32,
    #[serde(default = "default_max_inflight_blocks")]
    pub max_inflight_blocks: u32,
    #[serde(default = "default_snapshot_interval_size")]
    pub snapshot_interval_size: u32,
}

impl Default for RaftOptionsDef {
    fn default() -> Self {
        RaftOptionsDef {
            tick_interval: default_tick_interval(),
            election_tick: default_election_tick(),
            heartbeat_tick: default_heartbeat_tick(),
            max_inflight_blocks: default_max_inflight_blocks(),
            snapshot_interval_size: default_snapshot_interval_size(),
        }
    }
}

fn default_tick_interval() -> String {
    "500ms".to_string()
}

fn default_election_tick() -> u32 {
    10
}

fn default_heartbeat_tick() -> u32 {
    1
}

fn default_max_inflight_blocks() -> u32 {
    5
}

fn default_snapshot_interval_size() -> u32 {
    16 * 1024 * 1024
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsortiumDef {
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnchorPeerDef {
    pub host: String,
    pub port: i32,
}

/// An organization as listed in a profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "OrganizationEntry")]
pub struct Organization {
    /// Group name inside the channel configuration.
    pub name: String,
    /// MSP identifier.
    pub id: String,
    pub msp_dir: PathBuf,
    pub msp_type: String,
    pub policies: BTreeMap<String, PolicyDef>,
    pub anchor_peers: Vec<AnchorPeerDef>,
    pub orderer_endpoints: Vec<String>,
    /// The caller has no access to this organization's material; emit an
    /// empty group for it.
    pub skip_as_foreign: bool,
    /// Listed by name only; filled in from the shared organizations.
    pub reference: bool,
}

impl Default for Organization {
    fn default() -> Self {
        Organization {
            name: String::new(),
            id: String::new(),
            msp_dir: PathBuf::new(),
            msp_type: default_msp_type(),
            policies: BTreeMap::new(),
            anchor_peers: vec![],
            orderer_endpoints: vec![],
            skip_as_foreign: false,
            reference: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrganizationEntry {
    Reference(String),
    Inline(OrganizationDef),
}

#[derive(Deserialize)]
struct OrganizationDef {
    name: String,
    id: String,
    #[serde(default)]
    msp_dir: PathBuf,
    #[serde(default = "default_msp_type")]
    msp_type: String,
    #[serde(default)]
    policies: BTreeMap<String, PolicyDef>,
    #[serde(default)]
    anchor_peers: Vec<AnchorPeerDef>,
    #[serde(default)]
    orderer_endpoints: Vec<String>,
    #[serde(default)]
    skip_as_foreign: bool,
}

fn default_msp_type() -> String {
    crate::msp::BCCSP_MSP_TYPE_NAME.to_string()
}

impl From<OrganizationEntry> for Organization {
    fn from(entry: OrganizationEntry) -> Self {
        match entry {
            OrganizationEntry::Reference(name) => Organization {
                name,
                reference: true,
                ..Organization::default()
            },
            OrganizationEntry::Inline(def) => Organization {
                name: def.name,
                id: def.id,
                msp_dir: def.msp_dir,
                msp_type: def.msp_type,
                policies: def.policies,
                anchor_peers: def.anchor_peers,
                orderer_endpoints: def.orderer_endpoints,
                skip_as_foreign: def.skip_as_foreign,
                reference: false,
            },
        }
    }
}

impl TopLevel {
    /// Look up a profile and resolve its organization references.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let mut profile = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigTxError::validation(format!("profile '{name}' not found")))?;

        let resolve = |orgs: &mut Vec<Organization>| -> Result<()> {
            for org in orgs.iter_mut() {
                if !org.reference {
                    continue;
                }
                let shared = self
                    .organizations
                    .iter()
                    .find(|o| o.name == org.name)
                    .ok_or_else(|| {
                        ConfigTxError::validation(format!(
                            "profile '{name}' references unknown organization '{}'",
                            org.name
                        ))
                    })?;
                *org = shared.clone();
            }
            Ok(())
        };

        if let Some(orderer) = profile.orderer.as_mut() {
            resolve(&mut orderer.organizations)?;
        }
        if let Some(app) = profile.application.as_mut() {
            resolve(&mut app.organizations)?;
        }
        if let Some(consortiums) = profile.consortiums.as_mut() {
            for consortium in consortiums.values_mut() {
                resolve(&mut consortium.organizations)?;
            }
        }
        Ok(profile)
    }

    /// Make relative MSP directories and certificate paths relative to `base`.
    pub fn rebase_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };
        let rebase_orgs = |orgs: &mut Vec<Organization>| {
            for org in orgs {
                rebase(&mut org.msp_dir);
            }
        };

        rebase_orgs(&mut self.organizations);
        for profile in self.profiles.values_mut() {
            if let Some(orderer) = profile.orderer.as_mut() {
                rebase_orgs(&mut orderer.organizations);
                if let Some(raft) = orderer.etcd_raft.as_mut() {
                    for consenter in &mut raft.consenters {
                        rebase(&mut consenter.client_tls_cert);
                        rebase(&mut consenter.server_tls_cert);
                    }
                }
            }
            if let Some(app) = profile.application.as_mut() {
                rebase_orgs(&mut app.organizations);
            }
            if let Some(consortiums) = profile.consortiums.as_mut() {
                for consortium in consortiums.values_mut() {
                    rebase_orgs(&mut consortium.organizations);
                }
            }
        }
    }
}
