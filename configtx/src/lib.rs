//! configtx: channel configuration engine.
//!
//! - Policy expressions (`AND('Org1.admin', OR(...))`) compiled to signature
//!   policy trees and rendered back
//! - Versioned configuration trees built from declarative profiles
//! - Minimal read/write-set updates between two trees
//! - Genesis blocks and channel creation transactions

pub mod builder;
pub mod envelope;
pub mod error;
pub mod genesis;
pub mod msp;
pub mod policy;
pub mod profile;
pub mod proto;
pub mod signer;
pub mod tree;
pub mod update;
pub mod values;

pub use error::{BoxError, ConfigTxError, Result};
pub use genesis::{
    channel_creation_update, config_from_block, default_config_template, genesis_block,
    make_channel_creation_transaction,
};
pub use policy::{compile, render, render_policy};
pub use signer::{P256Signer, Signer};
pub use update::compute;
