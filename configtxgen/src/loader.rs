//! Credential material read from MSP directories on disk.
//!
//! ```text
//! msp/
//! ├── cacerts/               required
//! ├── intermediatecerts/
//! ├── admincerts/
//! ├── crls/
//! ├── tlscacerts/
//! └── tlsintermediatecerts/
//! ```
//!
//! Every regular file in these directories must hold at least one PEM
//! certificate (a PEM CRL under `crls/`). Directories other than `cacerts`
//! may be absent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use configtx::BoxError;
use configtx::msp::{BCCSP_MSP_TYPE_NAME, MaterialLoader, MspMaterial};
use tracing::debug;

const CACERTS: &str = "cacerts";
const INTERMEDIATECERTS: &str = "intermediatecerts";
const ADMINCERTS: &str = "admincerts";
const CRLS: &str = "crls";
const TLSCACERTS: &str = "tlscacerts";
const TLSINTERMEDIATECERTS: &str = "tlsintermediatecerts";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not load a valid ca certificate from directory {0}")]
    NoRootCerts(PathBuf),

    #[error("{path} is not a PEM file: {reason}")]
    NotPem { path: PathBuf, reason: String },

    #[error("unsupported MSP type '{0}'")]
    UnsupportedType(String),
}

/// Loads MSP material from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMspLoader;

impl MaterialLoader for FsMspLoader {
    fn load_msp(&self, dir: &Path, msp_id: &str, msp_type: &str) -> Result<MspMaterial, BoxError> {
        if msp_type != BCCSP_MSP_TYPE_NAME {
            return Err(LoadError::UnsupportedType(msp_type.to_string()).into());
        }
        let root_certs = read_pem_dir(&dir.join(CACERTS), PemKind::Certificate)?;
        if root_certs.is_empty() {
            return Err(LoadError::NoRootCerts(dir.join(CACERTS)).into());
        }
        let material = MspMaterial {
            root_certs,
            intermediate_certs: read_pem_dir(&dir.join(INTERMEDIATECERTS), PemKind::Certificate)?,
            admin_certs: read_pem_dir(&dir.join(ADMINCERTS), PemKind::Certificate)?,
            revocation_list: read_pem_dir(&dir.join(CRLS), PemKind::Crl)?,
            tls_root_certs: read_pem_dir(&dir.join(TLSCACERTS), PemKind::Certificate)?,
            tls_intermediate_certs: read_pem_dir(&dir.join(TLSINTERMEDIATECERTS), PemKind::Certificate)?,
            node_ous: None,
        };
        debug!(
            msp_id,
            dir = %dir.display(),
            root_certs = material.root_certs.len(),
            admin_certs = material.admin_certs.len(),
            "Loaded MSP material"
        );
        Ok(material)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
        fs::read(path).map_err(|source| {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum PemKind {
    Certificate,
    Crl,
}

impl PemKind {
    /// Number of well-formed PEM sections of this kind in `bytes`.
    fn count(self, bytes: &[u8]) -> io::Result<usize> {
        let mut rd = bytes;
        match self {
            PemKind::Certificate => rustls_pemfile::certs(&mut rd)
                .collect::<Result<Vec<_>, _>>()
                .map(|v| v.len()),
            PemKind::Crl => rustls_pemfile::crls(&mut rd)
                .collect::<Result<Vec<_>, _>>()
                .map(|v| v.len()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            PemKind::Certificate => "no certificate found",
            PemKind::Crl => "no certificate revocation list found",
        }
    }
}

/// Read every file of `dir` in name order. A missing directory is empty.
fn read_pem_dir(dir: &Path, kind: PemKind) -> Result<Vec<Vec<u8>>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut pems = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        match kind.count(&bytes) {
            Ok(0) => {
                return Err(LoadError::NotPem {
                    path,
                    reason: kind.label().to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => {
                return Err(LoadError::NotPem {
                    path,
                    reason: e.to_string(),
                });
            }
        }
        pems.push(bytes);
    }
    Ok(pems)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
    const CRL: &str = "-----BEGIN X509 CRL-----\nMIIB\n-----END X509 CRL-----\n";

    fn write(dir: &Path, sub: &str, name: &str, contents: &str) {
        fs::create_dir_all(dir.join(sub)).unwrap();
        fs::write(dir.join(sub).join(name), contents).unwrap();
    }

    #[test]
    fn loads_msp_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CACERTS, "b.pem", &PEM.replace("MIIB", "BBBB"));
        write(dir.path(), CACERTS, "a.pem", PEM);
        write(dir.path(), ADMINCERTS, "admin.pem", PEM);
        write(dir.path(), TLSCACERTS, "tls.pem", PEM);

        let material = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap();
        assert_eq!(material.root_certs.len(), 2);
        assert_eq!(material.root_certs[0], PEM.as_bytes());
        assert_eq!(material.admin_certs.len(), 1);
        assert_eq!(material.tls_root_certs.len(), 1);
        assert!(material.intermediate_certs.is_empty());
        assert!(material.revocation_list.is_empty());
    }

    #[test]
    fn cacerts_required() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ADMINCERTS, "admin.pem", PEM);
        let err = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap_err();
        assert!(err.to_string().contains("valid ca certificate"));
    }

    #[test]
    fn rejects_non_pem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CACERTS, "ca.der", "\u{30}\u{82}binary");
        let err = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap_err();
        assert!(err.to_string().contains("not a PEM file"));
    }

    #[test]
    fn rejects_text_that_only_mentions_pem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CACERTS, "ca.pem", "not a certificate -----BEGIN whatever");
        let err = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap_err();
        assert!(err.to_string().contains("not a PEM file"), "{err}");
    }

    #[test]
    fn rejects_truncated_pem_block() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CACERTS, "ca.pem", PEM);
        write(dir.path(), ADMINCERTS, "admin.pem", "-----BEGIN CERTIFICATE-----\nMIIB\n");
        let err = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("admin.pem") && msg.contains("not a PEM file"), "{msg}");
    }

    #[test]
    fn crls_need_crl_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CACERTS, "ca.pem", PEM);
        write(dir.path(), CRLS, "revoked.pem", CRL);
        let material = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap();
        assert_eq!(material.revocation_list.len(), 1);

        write(dir.path(), CRLS, "wrong.pem", PEM);
        let err = FsMspLoader
            .load_msp(dir.path(), "Org1MSP", BCCSP_MSP_TYPE_NAME)
            .unwrap_err();
        assert!(err.to_string().contains("no certificate revocation list"), "{err}");
    }

    #[test]
    fn rejects_unknown_msp_type() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsMspLoader.load_msp(dir.path(), "Org1MSP", "idemix").unwrap_err();
        assert_eq!(err.to_string(), "unsupported MSP type 'idemix'");
    }

    #[test]
    fn read_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("server.crt");
        let err = FsMspLoader.read_file(&missing).unwrap_err();
        assert!(err.to_string().contains("server.crt"));
        fs::write(&missing, PEM).unwrap();
        assert_eq!(FsMspLoader.read_file(&missing).unwrap(), PEM.as_bytes());
    }
}
