//! Transaction envelope assembly and signing.

use chrono::Utc;
use prost::Message;
use tracing::debug;

use crate::error::{ConfigTxError, Result};
use crate::proto::common::{
    ChannelHeader, ConfigSignature, ConfigUpdateEnvelope, Envelope, Header, HeaderType, Payload,
    SignatureHeader, Timestamp,
};
use crate::proto::{marshal, unmarshal};
use crate::signer::{self, Signer};

/// Channel header stamped with the current time (whole seconds).
pub fn make_channel_header(
    header_type: HeaderType,
    version: i32,
    channel_id: &str,
    epoch: u64,
) -> ChannelHeader {
    ChannelHeader {
        r#type: header_type as i32,
        version,
        timestamp: Some(Timestamp {
            seconds: Utc::now().timestamp(),
            nanos: 0,
        }),
        channel_id: channel_id.to_string(),
        epoch,
        ..ChannelHeader::default()
    }
}

/// Signature header with a fresh nonce. Without a signer the creator is empty.
pub fn new_signature_header(signer: Option<&dyn Signer>) -> Result<SignatureHeader> {
    let creator = match signer {
        Some(s) => s
            .serialize()
            .map_err(|e| ConfigTxError::collaborator("error serializing signer identity", e))?,
        None => Vec::new(),
    };
    Ok(SignatureHeader {
        creator,
        nonce: signer::create_nonce(),
    })
}

pub fn make_payload_header(channel_header: &ChannelHeader, signature_header: &SignatureHeader) -> Header {
    Header {
        channel_header: marshal(channel_header),
        signature_header: marshal(signature_header),
    }
}

/// Wrap `data` in a payload of `header_type` for `channel_id`, signed by
/// `signer` when one is given.
pub fn create_signed_envelope<M: Message>(
    header_type: HeaderType,
    channel_id: &str,
    signer: Option<&dyn Signer>,
    data: &M,
    version: i32,
    epoch: u64,
) -> Result<Envelope> {
    let signature_header = new_signature_header(signer)?;
    let mut channel_header = make_channel_header(header_type, version, channel_id, epoch);
    channel_header.tx_id = signer::compute_tx_id(&signature_header.nonce, &signature_header.creator);

    let payload = marshal(&Payload {
        header: Some(make_payload_header(&channel_header, &signature_header)),
        data: marshal(data),
    });
    let signature = match signer {
        Some(s) => s
            .sign(&payload)
            .map_err(|e| ConfigTxError::collaborator("error signing envelope", e))?,
        None => Vec::new(),
    };
    debug!(
        channel_id,
        tx_id = %channel_header.tx_id,
        header_type = ?header_type,
        signed = signer.is_some(),
        "Created envelope"
    );
    Ok(Envelope { payload, signature })
}

/// Append `signer`'s signature over `signatureHeader || configUpdate` to
/// the envelope.
pub fn sign_config_update(envelope: &mut ConfigUpdateEnvelope, signer: &dyn Signer) -> Result<()> {
    let signature_header = marshal(&new_signature_header(Some(signer))?);
    let mut message = signature_header.clone();
    message.extend_from_slice(&envelope.config_update);
    let signature = signer
        .sign(&message)
        .map_err(|e| ConfigTxError::collaborator("error signing config update", e))?;
    envelope.signatures.push(ConfigSignature {
        signature_header,
        signature,
    });
    Ok(())
}

/// Decode an envelope's payload and its channel header.
pub fn open_envelope(envelope: &Envelope) -> Result<(Payload, ChannelHeader)> {
    let payload: Payload = unmarshal(&envelope.payload)?;
    let header = payload
        .header
        .as_ref()
        .ok_or_else(|| ConfigTxError::validation("envelope payload has no header"))?;
    let channel_header: ChannelHeader = unmarshal(&header.channel_header)?;
    Ok((payload, channel_header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::proto::common::ConfigUpdate;
    use crate::proto::msp::SerializedIdentity;
    use crate::signer::P256Signer;
    use p256::ecdsa::Signature;
    use p256::ecdsa::signature::Verifier;

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, BoxError> {
            Err("hsm offline".into())
        }

        fn serialize(&self) -> Result<Vec<u8>, BoxError> {
            Ok(b"creator".to_vec())
        }
    }

    fn update_envelope() -> ConfigUpdateEnvelope {
        ConfigUpdateEnvelope {
            config_update: marshal(&ConfigUpdate {
                channel_id: "mychannel".into(),
                ..ConfigUpdate::default()
            }),
            signatures: vec![],
        }
    }

    #[test]
    fn test_unsigned_envelope() {
        let data = ConfigUpdate::default();
        let env = create_signed_envelope(HeaderType::ConfigUpdate, "mychannel", None, &data, 0, 0).unwrap();
        assert!(env.signature.is_empty());

        let (payload, ch) = open_envelope(&env).unwrap();
        assert_eq!(ch.r#type, HeaderType::ConfigUpdate as i32);
        assert_eq!(ch.channel_id, "mychannel");
        assert!(ch.timestamp.unwrap().seconds > 0);
        let sh: SignatureHeader = unmarshal(&payload.header.unwrap().signature_header).unwrap();
        assert!(sh.creator.is_empty());
        assert_eq!(ch.tx_id, signer::compute_tx_id(&sh.nonce, &[]));
    }

    #[test]
    fn test_signed_envelope_verifies() {
        let signer = P256Signer::generate("Org1MSP", b"cert".to_vec());
        let env = create_signed_envelope(
            HeaderType::ConfigUpdate,
            "mychannel",
            Some(&signer),
            &update_envelope(),
            0,
            0,
        )
        .unwrap();
        let sig = Signature::from_der(&env.signature).unwrap();
        assert!(signer.verifying_key().verify(&env.payload, &sig).is_ok());

        let (payload, _) = open_envelope(&env).unwrap();
        let sh: SignatureHeader = unmarshal(&payload.header.unwrap().signature_header).unwrap();
        let creator: SerializedIdentity = unmarshal(&sh.creator).unwrap();
        assert_eq!(creator.mspid, "Org1MSP");
    }

    #[test]
    fn test_sign_config_update_appends() {
        let org1 = P256Signer::generate("Org1MSP", vec![]);
        let org2 = P256Signer::generate("Org2MSP", vec![]);
        let mut env = update_envelope();
        sign_config_update(&mut env, &org1).unwrap();
        sign_config_update(&mut env, &org2).unwrap();
        assert_eq!(env.signatures.len(), 2);

        let second = &env.signatures[1];
        let mut signed = second.signature_header.clone();
        signed.extend_from_slice(&env.config_update);
        let sig = Signature::from_der(&second.signature).unwrap();
        assert!(org2.verifying_key().verify(&signed, &sig).is_ok());
        assert!(org1.verifying_key().verify(&signed, &sig).is_err());
    }

    #[test]
    fn test_signer_failure_is_collaborator_error() {
        let mut env = update_envelope();
        let err = sign_config_update(&mut env, &FailingSigner).unwrap_err();
        assert!(matches!(err, ConfigTxError::Collaborator { .. }));
        assert!(err.to_string().contains("hsm offline"));
        assert!(env.signatures.is_empty());
    }
}
