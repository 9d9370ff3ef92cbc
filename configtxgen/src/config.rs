//! Command line and configuration document loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use configtx::profile::{Profile, TopLevel};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "configtxgen=info,configtx=info";
/// Set to `1` for JSON log lines.
pub const LOG_JSON_ENV: &str = "CONFIGTXGEN_LOG_JSON";

#[derive(Parser, Debug)]
#[command(
    name = "configtxgen",
    about = "Build channel genesis blocks and channel creation transactions"
)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["output_block", "output_create_channel_tx", "inspect_block"])
))]
pub struct Args {
    /// TOML document with the organizations and profiles
    #[arg(long, env = "CONFIGTXGEN_CONFIG", default_value = "configtx.toml")]
    pub config: PathBuf,

    /// Profile to generate from
    #[arg(long)]
    pub profile: Option<String>,

    /// Channel the artifact is for
    #[arg(long, default_value = "mychannel")]
    pub channel_id: String,

    /// Write a genesis block to this file
    #[arg(long)]
    pub output_block: Option<PathBuf>,

    /// Write a channel creation transaction to this file
    #[arg(long)]
    pub output_create_channel_tx: Option<PathBuf>,

    /// Print the configuration held in this block as JSON
    #[arg(long)]
    pub inspect_block: Option<PathBuf>,

    /// PKCS#8 PEM private key signing the channel creation transaction
    #[arg(long, requires = "signer_msp_id")]
    pub signer_key: Option<PathBuf>,

    /// MSP ID of the signing identity
    #[arg(long, requires = "signer_key")]
    pub signer_msp_id: Option<String>,

    /// PEM certificate of the signing identity
    #[arg(long, requires = "signer_key")]
    pub signer_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OutputBlock(PathBuf),
    OutputCreateChannelTx(PathBuf),
    InspectBlock(PathBuf),
}

impl Args {
    pub fn action(&self) -> Result<Action> {
        if let Some(path) = &self.output_block {
            return Ok(Action::OutputBlock(path.clone()));
        }
        if let Some(path) = &self.output_create_channel_tx {
            return Ok(Action::OutputCreateChannelTx(path.clone()));
        }
        if let Some(path) = &self.inspect_block {
            return Ok(Action::InspectBlock(path.clone()));
        }
        bail!("no action requested")
    }

    /// Load the configuration document and pick the requested profile.
    pub fn load_profile(&self) -> Result<Profile> {
        let Some(name) = self.profile.as_deref() else {
            bail!("a --profile is required for this action");
        };
        let top = load_document(&self.config)?;
        Ok(top.profile(name)?)
    }
}

/// Parse a configuration document, resolving relative paths against its
/// directory.
pub fn load_document(path: &Path) -> Result<TopLevel> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("can't read config file {}", path.display()))?;
    let mut top: TopLevel = toml::from_str(&text)
        .with_context(|| format!("bad config file {}", path.display()))?;
    if let Some(dir) = path.parent() {
        top.rebase_paths(dir);
    }
    Ok(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_is_required() {
        assert!(Args::try_parse_from(["configtxgen", "--profile", "P"]).is_err());
        assert!(
            Args::try_parse_from([
                "configtxgen",
                "--output-block",
                "a.block",
                "--inspect-block",
                "b.block"
            ])
            .is_err()
        );
    }

    #[test]
    fn parses_output_block() {
        let args = Args::try_parse_from([
            "configtxgen",
            "--config",
            "net/configtx.toml",
            "--profile",
            "TwoOrgs",
            "--channel-id",
            "syschannel",
            "--output-block",
            "genesis.block",
        ])
        .unwrap();
        assert_eq!(args.channel_id, "syschannel");
        assert_eq!(args.action().unwrap(), Action::OutputBlock("genesis.block".into()));
    }

    #[test]
    fn signer_flags_go_together() {
        let err = Args::try_parse_from([
            "configtxgen",
            "--output-create-channel-tx",
            "ch.tx",
            "--signer-key",
            "key.pem",
        ]);
        assert!(err.is_err());
        let args = Args::try_parse_from([
            "configtxgen",
            "--output-create-channel-tx",
            "ch.tx",
            "--signer-key",
            "key.pem",
            "--signer-msp-id",
            "Org1MSP",
        ])
        .unwrap();
        assert_eq!(args.signer_msp_id.as_deref(), Some("Org1MSP"));
    }

    #[test]
    fn document_paths_rebased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configtx.toml");
        std::fs::write(
            &path,
            r#"
[[organizations]]
name = "Org1"
id = "Org1MSP"
msp_dir = "crypto/org1/msp"

[profiles.Channel]
consortium = "SampleConsortium"
[profiles.Channel.application]
organizations = ["Org1"]
"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "configtxgen",
            "--config",
            path.to_str().unwrap(),
            "--profile",
            "Channel",
            "--output-create-channel-tx",
            "ch.tx",
        ])
        .unwrap();
        let profile = args.load_profile().unwrap();
        let org = &profile.application.unwrap().organizations[0];
        assert_eq!(org.msp_dir, dir.path().join("crypto/org1/msp"));
    }

    #[test]
    fn missing_profile_flag() {
        let args = Args::try_parse_from(["configtxgen", "--output-block", "g.block"]).unwrap();
        assert!(args.load_profile().unwrap_err().to_string().contains("--profile"));
    }
}
