//! Signing identities for configuration transactions.

use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{BoxError, ConfigTxError, Result};
use crate::proto::marshal;
use crate::proto::msp::SerializedIdentity;

/// Length of the random nonce carried in every signature header.
pub const NONCE_SIZE: usize = 24;

/// An identity able to sign transactions on behalf of an organization.
pub trait Signer {
    /// Sign `message`. The signer hashes it itself.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Creator bytes identifying the signer to the network.
    fn serialize(&self) -> Result<Vec<u8>, BoxError>;
}

/// ECDSA P-256 signer with an X.509 identity.
#[derive(Debug, Clone)]
pub struct P256Signer {
    key: SigningKey,
    msp_id: String,
    cert: Vec<u8>,
}

impl P256Signer {
    pub fn new(key: SigningKey, msp_id: impl Into<String>, cert: Vec<u8>) -> Self {
        Self {
            key,
            msp_id: msp_id.into(),
            cert,
        }
    }

    /// Load the private key from a PKCS#8 PEM document.
    pub fn from_pkcs8_pem(pem: &str, msp_id: impl Into<String>, cert: Vec<u8>) -> Result<Self> {
        let key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| ConfigTxError::collaborator("invalid PKCS#8 signing key", e.to_string()))?;
        Ok(Self::new(key, msp_id, cert))
    }

    /// Fresh random key, mostly for tests and throwaway identities.
    pub fn generate(msp_id: impl Into<String>, cert: Vec<u8>) -> Self {
        Self::new(SigningKey::random(&mut rand::thread_rng()), msp_id, cert)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }
}

impl Signer for P256Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BoxError> {
        let sig: Signature = self.key.try_sign(message)?;
        // Verifiers reject high-S signatures.
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    fn serialize(&self) -> Result<Vec<u8>, BoxError> {
        Ok(marshal(&SerializedIdentity {
            mspid: self.msp_id.clone(),
            id_bytes: self.cert.clone(),
        }))
    }
}

pub fn create_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Transaction ID: hex SHA-256 over `nonce || creator`.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}
