//! Implicit-meta rules: `"ANY Readers"`, `"MAJORITY Admins"`, ...

use super::PolicyValue;
use crate::error::{ConfigTxError, Result};
use crate::proto::common::ImplicitMetaRule;

/// Parse `"<RULE> <SubPolicy>"`.
pub fn parse(rule: &str) -> Result<PolicyValue> {
    let tokens: Vec<&str> = rule.split(' ').collect();
    if tokens.len() != 2 {
        return Err(ConfigTxError::parse(format!(
            "expected two space separated tokens, but got {}",
            tokens.len()
        )));
    }
    let meta_rule = match tokens[0] {
        "ANY" => ImplicitMetaRule::Any,
        "ALL" => ImplicitMetaRule::All,
        "MAJORITY" => ImplicitMetaRule::Majority,
        other => {
            return Err(ConfigTxError::parse(format!(
                "unknown rule type '{other}', expected ALL, ANY, or MAJORITY"
            )));
        }
    };
    Ok(PolicyValue::implicit_meta(meta_rule, tokens[1]))
}

pub fn rule_name(rule: ImplicitMetaRule) -> &'static str {
    match rule {
        ImplicitMetaRule::Any => "ANY",
        ImplicitMetaRule::All => "ALL",
        ImplicitMetaRule::Majority => "MAJORITY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        assert_eq!(
            parse("ANY Readers").unwrap(),
            PolicyValue::implicit_meta(ImplicitMetaRule::Any, "Readers")
        );
        assert_eq!(
            parse("MAJORITY Admins").unwrap(),
            PolicyValue::implicit_meta(ImplicitMetaRule::Majority, "Admins")
        );
    }

    #[test]
    fn test_parse_rejects_bad_rules() {
        let err = parse("SOME Readers").unwrap_err();
        assert!(err.to_string().contains("'SOME'"), "{err}");
        assert!(parse("ANY").is_err());
        assert!(parse("ANY Readers Writers").is_err());
        assert!(parse("any Readers").is_err());
    }
}
