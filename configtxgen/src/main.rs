//! configtxgen: build channel artifacts from a profile document.
//!
//!   --output-block <file>              genesis block for --channel-id
//!   --output-create-channel-tx <file>  channel creation transaction
//!   --inspect-block <file>             print a config block as JSON
//!
//! Logs go to stderr. Set CONFIGTXGEN_LOG_JSON=1 for JSON lines.

mod config;
mod inspect;
mod loader;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use configtx::proto::common::Block;
use configtx::proto::{marshal, unmarshal};
use configtx::{P256Signer, Signer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Action, Args, DEFAULT_LOG_DIRECTIVE, LOG_JSON_ENV};
use loader::FsMspLoader;

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    match args.action()? {
        Action::OutputBlock(path) => output_block(&args, &path),
        Action::OutputCreateChannelTx(path) => output_create_channel_tx(&args, &path),
        Action::InspectBlock(path) => inspect_block(&path),
    }
}

fn init_tracing() {
    let json_logs = std::env::var(LOG_JSON_ENV).unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn output_block(args: &Args, path: &Path) -> Result<()> {
    let profile = args.load_profile()?;
    if profile.orderer.is_none() {
        bail!("refusing to generate block which is missing orderer section");
    }
    if profile.consortiums.is_none() {
        warn!("Genesis block does not contain a consortiums group definition; it cannot bootstrap an ordering system channel");
    }

    info!(channel_id = %args.channel_id, "Generating genesis block");
    let group = configtx::builder::new_channel_group(&profile, &FsMspLoader)
        .context("error building channel group")?;
    let block = configtx::genesis_block(&group, &args.channel_id)?;

    std::fs::write(path, marshal(&block))
        .with_context(|| format!("error writing genesis block to {}", path.display()))?;
    info!(path = %path.display(), "Wrote genesis block");
    Ok(())
}

fn output_create_channel_tx(args: &Args, path: &Path) -> Result<()> {
    let profile = args.load_profile()?;
    let signer = load_signer(args)?;

    info!(channel_id = %args.channel_id, signed = signer.is_some(), "Generating new channel configtx");
    let tx = configtx::make_channel_creation_transaction(
        &args.channel_id,
        signer.as_ref().map(|s| s as &dyn Signer),
        &profile,
        &FsMspLoader,
    )?;

    std::fs::write(path, marshal(&tx))
        .with_context(|| format!("error writing channel create tx to {}", path.display()))?;
    info!(path = %path.display(), "Wrote channel creation transaction");
    Ok(())
}

fn inspect_block(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("could not read block {}", path.display()))?;
    let block: Block = unmarshal(&bytes).context("error unmarshaling to block")?;
    let config = configtx::config_from_block(&block)?;
    println!("{}", serde_json::to_string_pretty(&inspect::config_to_json(&config))?);
    Ok(())
}

fn load_signer(args: &Args) -> Result<Option<P256Signer>> {
    let Some(key_path) = &args.signer_key else {
        return Ok(None);
    };
    let Some(msp_id) = &args.signer_msp_id else {
        bail!("--signer-msp-id is required with --signer-key");
    };
    let pem = std::fs::read_to_string(key_path)
        .with_context(|| format!("can't read signing key {}", key_path.display()))?;
    let cert = match &args.signer_cert {
        Some(p) => std::fs::read(p)
            .with_context(|| format!("can't read signing certificate {}", p.display()))?,
        None => Vec::new(),
    };
    Ok(Some(P256Signer::from_pkcs8_pem(&pem, msp_id.clone(), cert)?))
}
