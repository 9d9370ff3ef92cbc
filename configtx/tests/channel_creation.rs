//! Channel creation transaction tests.
//!
//! Tests cover:
//! - Creating a channel whose second organization is foreign to the creator
//! - Collecting a second organization's signature on the update
//! - Reading the consortium assertion back out of the transaction

use configtx::envelope::{open_envelope, sign_config_update};
use configtx::msp::{MemoryMspLoader, MspMaterial};
use configtx::profile::{Profile, TopLevel};
use configtx::proto::common::{ConfigUpdate, ConfigUpdateEnvelope, HeaderType};
use configtx::proto::msp::SerializedIdentity;
use configtx::proto::{marshal, unmarshal};
use configtx::values::{CONSORTIUM_KEY, StandardValue};
use configtx::{P256Signer, make_channel_creation_transaction};
use p256::ecdsa::Signature;
use p256::ecdsa::signature::Verifier;

const CHANNEL: &str = r#"
[[organizations]]
name = "Org1"
id = "Org1MSP"
[organizations.policies]
Admins = { type = "Signature", rule = "OR('Org1MSP.admin')" }
Readers = { type = "Signature", rule = "OR('Org1MSP.member')" }
Writers = { type = "Signature", rule = "OR('Org1MSP.member')" }

[profiles.TwoOrgsChannel]
consortium = "SampleConsortium"

[profiles.TwoOrgsChannel.policies]
Admins = { type = "ImplicitMeta", rule = "MAJORITY Admins" }
Readers = { type = "ImplicitMeta", rule = "ANY Readers" }
Writers = { type = "ImplicitMeta", rule = "ANY Writers" }

[profiles.TwoOrgsChannel.application]
organizations = ["Org1", { name = "Org2", id = "Org2MSP", skip_as_foreign = true }]
acls = { "peer/Propose" = "/Channel/Application/Writers" }
[profiles.TwoOrgsChannel.application.policies]
Admins = { type = "ImplicitMeta", rule = "MAJORITY Admins" }
Readers = { type = "ImplicitMeta", rule = "ANY Readers" }
Writers = { type = "ImplicitMeta", rule = "ANY Writers" }
Endorsement = { type = "Signature", rule = "OutOf(1, 'Org1MSP.peer', 'Org2MSP.peer')" }
"#;

fn profile() -> Profile {
    let top: TopLevel = toml::from_str(CHANNEL).unwrap();
    top.profile("TwoOrgsChannel").unwrap()
}

fn loader() -> MemoryMspLoader {
    MemoryMspLoader::new().with_org(
        "Org1MSP",
        MspMaterial {
            root_certs: vec![b"org1 root".to_vec()],
            ..MspMaterial::default()
        },
    )
}

fn update_envelope(tx: &configtx::proto::common::Envelope) -> ConfigUpdateEnvelope {
    let (payload, header) = open_envelope(tx).unwrap();
    assert_eq!(header.r#type, HeaderType::ConfigUpdate as i32);
    unmarshal(&payload.data).unwrap()
}

#[test]
fn foreign_org_needs_no_material() {
    let tx = make_channel_creation_transaction("mychannel", None, &profile(), &loader()).unwrap();
    let update: ConfigUpdate = unmarshal(&update_envelope(&tx).config_update).unwrap();

    let write = update.write_set.unwrap();
    let app = &write.groups["Application"];
    assert_eq!(app.policies.len(), 4);
    assert!(app.values.contains_key("ACLs"));
    assert!(app.groups.is_empty());

    let read = update.read_set.unwrap();
    let read_app = &read.groups["Application"];
    assert!(read_app.policies.is_empty());
    assert!(read_app.values.is_empty());
}

#[test]
fn consortium_asserted_in_both_sets() {
    let tx = make_channel_creation_transaction("mychannel", None, &profile(), &loader()).unwrap();
    let update: ConfigUpdate = unmarshal(&update_envelope(&tx).config_update).unwrap();
    assert_eq!(update.channel_id, "mychannel");

    let read = &update.read_set.unwrap().values[CONSORTIUM_KEY];
    assert_eq!(read.version, 0);
    assert!(read.value.is_empty());
    let write = &update.write_set.unwrap().values[CONSORTIUM_KEY];
    assert_eq!(write.version, 0);
    assert_eq!(
        StandardValue::decode(CONSORTIUM_KEY, &write.value).unwrap(),
        StandardValue::Consortium("SampleConsortium".into())
    );
}

#[test]
fn second_org_countersigns() {
    let org1 = P256Signer::generate("Org1MSP", b"org1 cert".to_vec());
    let org2 = P256Signer::generate("Org2MSP", b"org2 cert".to_vec());

    let tx = make_channel_creation_transaction("mychannel", Some(&org1), &profile(), &loader()).unwrap();
    let sig = Signature::from_der(&tx.signature).unwrap();
    assert!(org1.verifying_key().verify(&tx.payload, &sig).is_ok());

    let mut envelope = update_envelope(&tx);
    sign_config_update(&mut envelope, &org2).unwrap();
    assert_eq!(envelope.signatures.len(), 2);

    for (signature, signer) in envelope.signatures.iter().zip([&org1, &org2]) {
        let mut signed = signature.signature_header.clone();
        signed.extend_from_slice(&envelope.config_update);
        let sig = Signature::from_der(&signature.signature).unwrap();
        assert!(signer.verifying_key().verify(&signed, &sig).is_ok());

        let header: configtx::proto::common::SignatureHeader =
            unmarshal(&signature.signature_header).unwrap();
        let creator: SerializedIdentity = unmarshal(&header.creator).unwrap();
        assert_eq!(creator.mspid, signer.msp_id());
    }

    // Re-encoding the envelope keeps both signatures.
    let decoded: ConfigUpdateEnvelope = unmarshal(&marshal(&envelope)).unwrap();
    assert_eq!(decoded, envelope);
}
