//! Access policies.
//!
//! - `dsl`: gate expressions (`AND`/`OR`/`OutOf`) to signature policy envelopes and back
//! - `implicit`: `"<RULE> <SubPolicy>"` implicit-meta rules

pub mod dsl;
pub mod implicit;

use std::fmt;

use prost::Message;

use crate::error::{ConfigTxError, Result};
use crate::proto::common::{
    ImplicitMetaPolicy, ImplicitMetaRule, Policy, PolicyType, SignaturePolicyEnvelope,
};
use crate::proto::msp::{MspPrincipal, MspRole, PrincipalClassification};

pub use crate::proto::msp::MspRoleType;
pub use dsl::{compile, render};

impl MspRoleType {
    /// Parse a role name as written in policy expressions (case-insensitive).
    pub fn from_role_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "member" => Some(MspRoleType::Member),
            "admin" => Some(MspRoleType::Admin),
            "client" => Some(MspRoleType::Client),
            "peer" => Some(MspRoleType::Peer),
            "orderer" => Some(MspRoleType::Orderer),
            _ => None,
        }
    }

    pub fn role_name(self) -> &'static str {
        match self {
            MspRoleType::Member => "member",
            MspRoleType::Admin => "admin",
            MspRoleType::Client => "client",
            MspRoleType::Peer => "peer",
            MspRoleType::Orderer => "orderer",
        }
    }
}

/// An identity class: an organization plus a role within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub msp_id: String,
    pub role: MspRoleType,
}

impl Principal {
    pub fn to_proto(&self) -> MspPrincipal {
        let role = MspRole {
            msp_identifier: self.msp_id.clone(),
            role: self.role as i32,
        };
        MspPrincipal {
            principal_classification: PrincipalClassification::Role as i32,
            principal: role.encode_to_vec(),
        }
    }

    /// Only role principals can be expressed in the policy language.
    pub fn from_proto(principal: &MspPrincipal) -> Result<Self> {
        if principal.principal_classification != PrincipalClassification::Role as i32 {
            return Err(ConfigTxError::validation(format!(
                "principal classification {} cannot be rendered as a policy expression",
                principal.principal_classification
            )));
        }
        let role = MspRole::decode(principal.principal.as_slice())?;
        let role_type = MspRoleType::try_from(role.role)
            .map_err(|_| ConfigTxError::validation(format!("unknown MSP role {}", role.role)))?;
        Ok(Principal {
            msp_id: role.msp_identifier,
            role: role_type,
        })
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.msp_id, self.role.role_name())
    }
}

/// The content of a configuration policy.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyValue {
    /// Delegates to the same-named policy of every child group.
    ImplicitMeta {
        rule: ImplicitMetaRule,
        sub_policy: String,
    },
    Signature(SignaturePolicyEnvelope),
}

impl PolicyValue {
    pub fn implicit_meta(rule: ImplicitMetaRule, sub_policy: impl Into<String>) -> Self {
        PolicyValue::ImplicitMeta {
            rule,
            sub_policy: sub_policy.into(),
        }
    }

    /// A signature policy every request satisfies: `NOutOf(0, [])`.
    pub fn accept_all() -> Self {
        PolicyValue::Signature(SignaturePolicyEnvelope {
            version: 0,
            rule: Some(dsl::n_out_of(0, vec![])),
            identities: vec![],
        })
    }

    pub fn to_proto(&self) -> Policy {
        match self {
            PolicyValue::ImplicitMeta { rule, sub_policy } => Policy {
                r#type: PolicyType::ImplicitMeta as i32,
                value: ImplicitMetaPolicy {
                    sub_policy: sub_policy.clone(),
                    rule: *rule as i32,
                }
                .encode_to_vec(),
            },
            PolicyValue::Signature(envelope) => Policy {
                r#type: PolicyType::Signature as i32,
                value: envelope.encode_to_vec(),
            },
        }
    }

    pub fn from_proto(policy: &Policy) -> Result<Self> {
        match PolicyType::try_from(policy.r#type) {
            Ok(PolicyType::ImplicitMeta) => {
                let imp = ImplicitMetaPolicy::decode(policy.value.as_slice())?;
                let rule = ImplicitMetaRule::try_from(imp.rule).map_err(|_| {
                    ConfigTxError::validation(format!("unknown implicit meta rule {}", imp.rule))
                })?;
                Ok(PolicyValue::ImplicitMeta {
                    rule,
                    sub_policy: imp.sub_policy,
                })
            }
            Ok(PolicyType::Signature) => Ok(PolicyValue::Signature(
                SignaturePolicyEnvelope::decode(policy.value.as_slice())?,
            )),
            _ => Err(ConfigTxError::validation(format!(
                "unsupported policy type {}",
                policy.r#type
            ))),
        }
    }

    /// Human-readable form: gate syntax or `"<RULE> <SubPolicy>"`.
    pub fn render(&self) -> Result<String> {
        match self {
            PolicyValue::ImplicitMeta { rule, sub_policy } => {
                Ok(format!("{} {sub_policy}", implicit::rule_name(*rule)))
            }
            PolicyValue::Signature(envelope) => dsl::render(envelope),
        }
    }
}

/// Render a wire policy, whichever kind it is.
pub fn render_policy(policy: &Policy) -> Result<String> {
    PolicyValue::from_proto(policy)?.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_proto_round_trip() {
        let p = Principal {
            msp_id: "Org1MSP".into(),
            role: MspRoleType::Client,
        };
        assert_eq!(Principal::from_proto(&p.to_proto()).unwrap(), p);
        assert_eq!(p.to_string(), "Org1MSP.client");
    }

    #[test]
    fn test_non_role_principal_rejected() {
        let p = MspPrincipal {
            principal_classification: PrincipalClassification::Identity as i32,
            principal: vec![1, 2, 3],
        };
        assert!(Principal::from_proto(&p).is_err());
    }

    #[test]
    fn test_render_policy_kinds() {
        let imp = PolicyValue::implicit_meta(ImplicitMetaRule::Majority, "Admins").to_proto();
        assert_eq!(render_policy(&imp).unwrap(), "MAJORITY Admins");

        let sig = PolicyValue::Signature(compile("OR('Org1MSP.member')").unwrap()).to_proto();
        assert_eq!(sig.r#type, PolicyType::Signature as i32);
        assert_eq!(render_policy(&sig).unwrap(), "AND('Org1MSP.member')");
    }

    #[test]
    fn test_accept_all_has_no_identities() {
        let PolicyValue::Signature(env) = PolicyValue::accept_all() else {
            panic!("accept_all must be a signature policy");
        };
        assert!(env.identities.is_empty());
        assert_eq!(env.rule, Some(dsl::n_out_of(0, vec![])));
    }

    #[test]
    fn test_unknown_policy_type() {
        let p = Policy {
            r#type: PolicyType::Msp as i32,
            value: vec![],
        };
        assert!(PolicyValue::from_proto(&p).is_err());
    }
}
