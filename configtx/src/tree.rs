//! Configuration tree model.
//!
//! A channel's configuration is a strict tree of `ConfigGroup`s, each holding
//! named values, named policies and named child groups. Helpers here only
//! touch the group handed to them.

use std::collections::BTreeMap;

use crate::error::{ConfigTxError, Result};
use crate::policy::PolicyValue;
use crate::proto::common::{ConfigGroup, ConfigPolicy, ConfigValue};

// ─── Well-known names ────────────────────────────────────────────────────────

pub const CHANNEL_GROUP_KEY: &str = "Channel";
pub const ORDERER_GROUP_KEY: &str = "Orderer";
pub const APPLICATION_GROUP_KEY: &str = "Application";
pub const CONSORTIUMS_GROUP_KEY: &str = "Consortiums";

pub const ADMINS_POLICY_KEY: &str = "Admins";
pub const READERS_POLICY_KEY: &str = "Readers";
pub const WRITERS_POLICY_KEY: &str = "Writers";
pub const BLOCK_VALIDATION_POLICY_KEY: &str = "BlockValidation";

/// Absolute path of the ordering service admins policy.
pub const ORDERER_ADMINS_POLICY_NAME: &str = "/Channel/Orderer/Admins";

/// Policies every channel, application and organization group must define.
pub const STANDARD_POLICIES: [&str; 3] = [ADMINS_POLICY_KEY, READERS_POLICY_KEY, WRITERS_POLICY_KEY];

/// Policies the orderer group must define.
pub const ORDERER_POLICIES: [&str; 4] = [
    ADMINS_POLICY_KEY,
    READERS_POLICY_KEY,
    WRITERS_POLICY_KEY,
    BLOCK_VALIDATION_POLICY_KEY,
];

// ─── Builders ────────────────────────────────────────────────────────────────

/// An empty group at version 0.
pub fn new_group() -> ConfigGroup {
    ConfigGroup::default()
}

/// An empty group governed by `mod_policy`.
pub fn new_group_with_mod_policy(mod_policy: &str) -> ConfigGroup {
    ConfigGroup {
        mod_policy: mod_policy.to_string(),
        ..ConfigGroup::default()
    }
}

pub fn set_value(group: &mut ConfigGroup, name: &str, payload: Vec<u8>, mod_policy: &str) {
    group.values.insert(
        name.to_string(),
        ConfigValue {
            version: 0,
            value: payload,
            mod_policy: mod_policy.to_string(),
        },
    );
}

pub fn set_policy(group: &mut ConfigGroup, name: &str, policy: &PolicyValue, mod_policy: &str) {
    group.policies.insert(
        name.to_string(),
        ConfigPolicy {
            version: 0,
            policy: Some(policy.to_proto()),
            mod_policy: mod_policy.to_string(),
        },
    );
}

/// Fail with `no <Name> policy defined` for the first required name missing.
pub fn require_policies<V>(policies: &BTreeMap<String, V>, required: &[&str]) -> Result<()> {
    if policies.is_empty() {
        return Err(ConfigTxError::validation("no policies defined"));
    }
    for name in required {
        if !policies.contains_key(*name) {
            return Err(ConfigTxError::validation(format!("no {name} policy defined")));
        }
    }
    Ok(())
}

/// Follow a path of group names down from `root`.
pub fn group_at<'a>(root: &'a ConfigGroup, path: &[&str]) -> Option<&'a ConfigGroup> {
    path.iter().try_fold(root, |group, name| group.groups.get(*name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::common::ImplicitMetaRule;

    #[test]
    fn test_new_group_is_empty() {
        let g = new_group();
        assert_eq!(g.version, 0);
        assert!(g.groups.is_empty() && g.values.is_empty() && g.policies.is_empty());
        assert!(g.mod_policy.is_empty());
    }

    #[test]
    fn test_set_value_and_policy() {
        let mut g = new_group_with_mod_policy(ADMINS_POLICY_KEY);
        set_value(&mut g, "Foo", vec![1, 2], ADMINS_POLICY_KEY);
        let readers = PolicyValue::implicit_meta(ImplicitMetaRule::Any, READERS_POLICY_KEY);
        set_policy(&mut g, READERS_POLICY_KEY, &readers, ADMINS_POLICY_KEY);

        assert_eq!(g.values["Foo"].value, vec![1, 2]);
        assert_eq!(g.values["Foo"].mod_policy, ADMINS_POLICY_KEY);
        assert_eq!(
            PolicyValue::from_proto(g.policies[READERS_POLICY_KEY].policy.as_ref().unwrap()).unwrap(),
            readers
        );
    }

    #[test]
    fn test_require_policies() {
        let mut policies = BTreeMap::new();
        assert_eq!(
            require_policies(&policies, &STANDARD_POLICIES).unwrap_err().to_string(),
            "Validation error: no policies defined"
        );
        policies.insert(ADMINS_POLICY_KEY.to_string(), ());
        policies.insert(READERS_POLICY_KEY.to_string(), ());
        let err = require_policies(&policies, &STANDARD_POLICIES).unwrap_err();
        assert!(err.to_string().contains("no Writers policy defined"));
        policies.insert(WRITERS_POLICY_KEY.to_string(), ());
        assert!(require_policies(&policies, &STANDARD_POLICIES).is_ok());
        let err = require_policies(&policies, &ORDERER_POLICIES).unwrap_err();
        assert!(err.to_string().contains("no BlockValidation policy defined"));
    }

    #[test]
    fn test_group_at() {
        let mut root = new_group();
        let mut app = new_group();
        app.groups.insert("Org1".into(), new_group_with_mod_policy("Admins"));
        root.groups.insert(APPLICATION_GROUP_KEY.into(), app);
        assert_eq!(group_at(&root, &["Application", "Org1"]).unwrap().mod_policy, "Admins");
        assert!(group_at(&root, &["Orderer"]).is_none());
        assert_eq!(group_at(&root, &[]), Some(&root));
    }
}
