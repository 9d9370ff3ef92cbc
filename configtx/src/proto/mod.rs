//! Wire messages.
//!
//! Declared by hand with `prost` derives so the crate needs no protoc step.
//! Field numbers follow the network's published schema; every map is a
//! `BTreeMap` so a given logical tree always encodes to the same bytes.

pub mod common;
pub mod msp;
pub mod orderer;
pub mod peer;

use prost::Message;

use crate::error::Result;

/// Encode any message to its wire bytes.
pub fn marshal<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Decode wire bytes into `M`.
pub fn unmarshal<M: Message + Default>(bytes: &[u8]) -> Result<M> {
    Ok(M::decode(bytes)?)
}
