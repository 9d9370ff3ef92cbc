//! Credential material for organizations.
//!
//! Loading certificates is a collaborator concern: the builder asks a
//! [`MaterialLoader`] for an organization's material and turns whatever comes
//! back into the `MSP` configuration value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use prost::Message;

use crate::error::{BoxError, ConfigTxError, Result};
use crate::proto::msp::{FabricCryptoConfig, FabricMspConfig, FabricNodeOus, FabricOuIdentifier, MspConfig};

/// `MSPConfig.type` for X.509 MSPs.
pub const FABRIC_MSP_TYPE: i32 = 0;
pub const BCCSP_MSP_TYPE_NAME: &str = "bccsp";

/// Verifying material of one organization. Certificates are PEM bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MspMaterial {
    pub root_certs: Vec<Vec<u8>>,
    pub intermediate_certs: Vec<Vec<u8>>,
    pub admin_certs: Vec<Vec<u8>>,
    pub revocation_list: Vec<Vec<u8>>,
    pub tls_root_certs: Vec<Vec<u8>>,
    pub tls_intermediate_certs: Vec<Vec<u8>>,
    pub node_ous: Option<NodeOus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOus {
    pub enable: bool,
    pub client: Option<OuIdentifier>,
    pub peer: Option<OuIdentifier>,
    pub admin: Option<OuIdentifier>,
    pub orderer: Option<OuIdentifier>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OuIdentifier {
    pub certificate: Vec<u8>,
    pub organizational_unit: String,
}

impl OuIdentifier {
    fn to_proto(&self) -> FabricOuIdentifier {
        FabricOuIdentifier {
            certificate: self.certificate.clone(),
            organizational_unit_identifier: self.organizational_unit.clone(),
        }
    }
}

/// Source of organization credential material.
pub trait MaterialLoader {
    /// Load the material found under `dir` for `msp_id`.
    fn load_msp(&self, dir: &Path, msp_id: &str, msp_type: &str) -> Result<MspMaterial, BoxError>;

    /// Read a single certificate file (raft consenter TLS certificates).
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BoxError>;
}

#[derive(Debug, thiserror::Error)]
#[error("no credential material found for {0}")]
pub struct MaterialNotFound(pub String);

/// Build the verifying `MSP` value for an organization.
pub fn verifying_msp_config(msp_id: &str, material: &MspMaterial) -> Result<MspConfig> {
    if material.root_certs.is_empty() {
        return Err(ConfigTxError::validation(format!(
            "MSP {msp_id} has no root CA certificates"
        )));
    }
    let fabric = FabricMspConfig {
        name: msp_id.to_string(),
        root_certs: material.root_certs.clone(),
        intermediate_certs: material.intermediate_certs.clone(),
        admins: material.admin_certs.clone(),
        revocation_list: material.revocation_list.clone(),
        signing_identity: None,
        organizational_unit_identifiers: vec![],
        crypto_config: Some(FabricCryptoConfig {
            signature_hash_family: "SHA2".to_string(),
            identity_identifier_hash_function: "SHA256".to_string(),
        }),
        tls_root_certs: material.tls_root_certs.clone(),
        tls_intermediate_certs: material.tls_intermediate_certs.clone(),
        fabric_node_ous: material.node_ous.as_ref().map(|ous| FabricNodeOus {
            enable: ous.enable,
            client_ou_identifier: ous.client.as_ref().map(OuIdentifier::to_proto),
            peer_ou_identifier: ous.peer.as_ref().map(OuIdentifier::to_proto),
            admin_ou_identifier: ous.admin.as_ref().map(OuIdentifier::to_proto),
            orderer_ou_identifier: ous.orderer.as_ref().map(OuIdentifier::to_proto),
        }),
    };
    Ok(MspConfig {
        r#type: FABRIC_MSP_TYPE,
        config: fabric.encode_to_vec(),
    })
}

/// In-memory loader keyed by MSP ID, for tests and embedding callers that
/// already hold their certificates.
#[derive(Debug, Clone, Default)]
pub struct MemoryMspLoader {
    orgs: BTreeMap<String, MspMaterial>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryMspLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, msp_id: &str, material: MspMaterial) -> Self {
        self.orgs.insert(msp_id.to_string(), material);
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        self.files.insert(path.into(), contents);
        self
    }
}

impl MaterialLoader for MemoryMspLoader {
    fn load_msp(&self, _dir: &Path, msp_id: &str, _msp_type: &str) -> Result<MspMaterial, BoxError> {
        self.orgs
            .get(msp_id)
            .cloned()
            .ok_or_else(|| MaterialNotFound(msp_id.to_string()).into())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| MaterialNotFound(path.display().to_string()).into())
    }
}
