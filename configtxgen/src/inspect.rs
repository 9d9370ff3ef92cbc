//! JSON view of a configuration tree.

use configtx::policy::render_policy;
use configtx::proto::common::{Config, ConfigGroup};
use configtx::values::StandardValue;
use serde_json::{Map, Value as Json, json};

pub fn config_to_json(config: &Config) -> Json {
    json!({
        "sequence": config.sequence,
        "channel_group": config.channel_group.as_ref().map(group_to_json),
    })
}

pub fn group_to_json(group: &ConfigGroup) -> Json {
    let groups: Map<String, Json> = group
        .groups
        .iter()
        .map(|(name, child)| (name.clone(), group_to_json(child)))
        .collect();

    let values: Map<String, Json> = group
        .values
        .iter()
        .map(|(name, value)| {
            let decoded = match StandardValue::decode(name, &value.value) {
                Ok(v) => v.to_json(),
                Err(_) => json!({ "raw": hex::encode(&value.value) }),
            };
            let entry = json!({
                "version": value.version,
                "mod_policy": value.mod_policy,
                "value": decoded,
            });
            (name.clone(), entry)
        })
        .collect();

    let policies: Map<String, Json> = group
        .policies
        .iter()
        .map(|(name, policy)| {
            let rendered = match policy.policy.as_ref().map(render_policy) {
                Some(Ok(rule)) => Json::String(rule),
                Some(Err(e)) => json!({ "error": e.to_string() }),
                None => Json::Null,
            };
            let entry = json!({
                "version": policy.version,
                "mod_policy": policy.mod_policy,
                "policy": rendered,
            });
            (name.clone(), entry)
        })
        .collect();

    json!({
        "version": group.version,
        "mod_policy": group.mod_policy,
        "groups": groups,
        "values": values,
        "policies": policies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use configtx::policy::{PolicyValue, compile};
    use configtx::proto::common::ImplicitMetaRule;
    use configtx::tree;

    #[test]
    fn renders_values_and_policies() {
        let mut org = tree::new_group_with_mod_policy("Admins");
        tree::set_policy(
            &mut org,
            "Admins",
            &PolicyValue::Signature(compile("OR('Org1MSP.admin')").unwrap()),
            "Admins",
        );
        let mut channel = tree::new_group_with_mod_policy("Admins");
        StandardValue::Consortium("SampleConsortium".into()).add_to(&mut channel, "Admins");
        tree::set_value(&mut channel, "Custom", vec![0xde, 0xad], "Admins");
        tree::set_policy(
            &mut channel,
            "Readers",
            &PolicyValue::implicit_meta(ImplicitMetaRule::Any, "Readers"),
            "Admins",
        );
        channel.groups.insert("Org1".into(), org);

        let out = group_to_json(&channel);
        assert_eq!(out["values"]["Consortium"]["value"]["name"], "SampleConsortium");
        assert_eq!(out["values"]["Custom"]["value"]["raw"], "dead");
        assert_eq!(out["policies"]["Readers"]["policy"], "ANY Readers");
        assert_eq!(out["groups"]["Org1"]["policies"]["Admins"]["policy"], "AND('Org1MSP.admin')");
        assert_eq!(out["groups"]["Org1"]["mod_policy"], "Admins");
    }

    #[test]
    fn empty_config() {
        let out = config_to_json(&Config::default());
        assert_eq!(out["sequence"], 0);
        assert!(out["channel_group"].is_null());
    }
}
