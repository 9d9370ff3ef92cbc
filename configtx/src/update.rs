//! Configuration update computation.
//!
//! Given the tree a channel currently has and the tree it should have,
//! produce the read set (versions the submitter observed) and write set (new
//! content at bumped versions) that move one to the other.
//!
//! Per level, the `values`, `policies` and `groups` maps are compared
//! independently:
//!
//! | key present in      | outcome                                                    |
//! |---------------------|------------------------------------------------------------|
//! | both, identical     | unchanged                                                  |
//! | both, different     | write at `version + 1` with new content, read at `version` |
//! | original only       | dropped, parent's membership changed                       |
//! | updated only        | write at version 0 with full content, parent's membership changed |
//!
//! A level is part of the update when anything beneath it changed, its
//! membership changed, or its own mod policy changed. Included levels are
//! written at `version + 1` and read at `version`; their unchanged values and
//! policies are repeated in both sets at their original version, while
//! unchanged child groups are left out.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ConfigTxError, Result};
use crate::proto::common::{Config, ConfigGroup, ConfigPolicy, ConfigUpdate, ConfigValue};

/// Compute the update turning `original` into `updated`.
///
/// Fails with [`ConfigTxError::NoDifferences`] when the trees are identical.
pub fn compute(original: &Config, updated: &Config) -> Result<ConfigUpdate> {
    let original_group = original
        .channel_group
        .as_ref()
        .ok_or_else(|| ConfigTxError::validation("no channel group included for original config"))?;
    let updated_group = updated
        .channel_group
        .as_ref()
        .ok_or_else(|| ConfigTxError::validation("no channel group included for updated config"))?;
    compute_group_update(original_group, updated_group)
}

/// [`compute`] over bare channel groups.
pub fn compute_group_update(original: &ConfigGroup, updated: &ConfigGroup) -> Result<ConfigUpdate> {
    let diff = diff_group("", original, updated);
    if !diff.updated {
        return Err(ConfigTxError::NoDifferences);
    }
    Ok(ConfigUpdate {
        channel_id: String::new(),
        read_set: Some(diff.read),
        write_set: Some(diff.write),
        isolated_data: BTreeMap::new(),
    })
}

struct GroupDiff {
    read: ConfigGroup,
    write: ConfigGroup,
    updated: bool,
}

struct MapDiff<T> {
    read: BTreeMap<String, T>,
    write: BTreeMap<String, T>,
    same: BTreeMap<String, T>,
    members_changed: bool,
}

impl<T> MapDiff<T> {
    fn new() -> Self {
        MapDiff {
            read: BTreeMap::new(),
            write: BTreeMap::new(),
            same: BTreeMap::new(),
            members_changed: false,
        }
    }

    fn has_changes(&self) -> bool {
        self.members_changed || !self.read.is_empty() || !self.write.is_empty()
    }
}

/// Leaf entries (values and policies) share one diff routine.
trait Leaf: Clone {
    fn version(&self) -> u64;
    fn same_content(&self, other: &Self) -> bool;
    /// Version-only precondition entry.
    fn read_marker(&self) -> Self;
    /// `other`'s content at `version`.
    fn rewrite(other: &Self, version: u64) -> Self;
}

impl Leaf for ConfigValue {
    fn version(&self) -> u64 {
        self.version
    }

    fn same_content(&self, other: &Self) -> bool {
        self.mod_policy == other.mod_policy && self.value == other.value
    }

    fn read_marker(&self) -> Self {
        ConfigValue {
            version: self.version,
            ..ConfigValue::default()
        }
    }

    fn rewrite(other: &Self, version: u64) -> Self {
        ConfigValue {
            version,
            ..other.clone()
        }
    }
}

impl Leaf for ConfigPolicy {
    fn version(&self) -> u64 {
        self.version
    }

    fn same_content(&self, other: &Self) -> bool {
        self.mod_policy == other.mod_policy && self.policy == other.policy
    }

    fn read_marker(&self) -> Self {
        ConfigPolicy {
            version: self.version,
            ..ConfigPolicy::default()
        }
    }

    fn rewrite(other: &Self, version: u64) -> Self {
        ConfigPolicy {
            version,
            ..other.clone()
        }
    }
}

fn diff_leaves<T: Leaf>(original: &BTreeMap<String, T>, updated: &BTreeMap<String, T>) -> MapDiff<T> {
    let mut diff = MapDiff::new();
    for (name, orig) in original {
        let Some(upd) = updated.get(name) else {
            diff.members_changed = true;
            continue;
        };
        if orig.same_content(upd) {
            diff.same.insert(name.clone(), orig.clone());
            continue;
        }
        diff.read.insert(name.clone(), orig.read_marker());
        diff.write.insert(name.clone(), T::rewrite(upd, orig.version() + 1));
    }
    for (name, upd) in updated {
        if original.contains_key(name) {
            continue;
        }
        diff.members_changed = true;
        diff.write.insert(name.clone(), T::rewrite(upd, 0));
    }
    diff
}

fn diff_groups(
    path: &str,
    original: &BTreeMap<String, ConfigGroup>,
    updated: &BTreeMap<String, ConfigGroup>,
) -> MapDiff<ConfigGroup> {
    let mut diff = MapDiff::new();
    for (name, orig) in original {
        let Some(upd) = updated.get(name) else {
            debug!(path = %format!("{path}/{name}"), "Group removed");
            diff.members_changed = true;
            continue;
        };
        let child = diff_group(&format!("{path}/{name}"), orig, upd);
        if child.updated {
            diff.read.insert(name.clone(), child.read);
            diff.write.insert(name.clone(), child.write);
        }
    }
    for (name, upd) in updated {
        if original.contains_key(name) {
            continue;
        }
        debug!(path = %format!("{path}/{name}"), "Group added");
        diff.members_changed = true;
        diff.write.insert(name.clone(), fresh_group(upd));
    }
    diff
}

fn diff_group(path: &str, original: &ConfigGroup, updated: &ConfigGroup) -> GroupDiff {
    let values = diff_leaves(&original.values, &updated.values);
    let policies = diff_leaves(&original.policies, &updated.policies);
    let groups = diff_groups(path, &original.groups, &updated.groups);

    let included = values.has_changes()
        || policies.has_changes()
        || groups.has_changes()
        || original.mod_policy != updated.mod_policy;
    if !included {
        return GroupDiff {
            read: version_only(original.version),
            write: version_only(original.version),
            updated: false,
        };
    }

    debug!(
        path = if path.is_empty() { "/" } else { path },
        from = original.version,
        to = original.version + 1,
        "Group modified"
    );

    let mut read_values = values.read;
    let mut write_values = values.write;
    for (name, value) in values.same {
        read_values.insert(name.clone(), value.clone());
        write_values.insert(name, value);
    }
    let mut read_policies = policies.read;
    let mut write_policies = policies.write;
    for (name, policy) in policies.same {
        read_policies.insert(name.clone(), policy.clone());
        write_policies.insert(name, policy);
    }

    GroupDiff {
        read: ConfigGroup {
            version: original.version,
            groups: groups.read,
            values: read_values,
            policies: read_policies,
            mod_policy: String::new(),
        },
        write: ConfigGroup {
            version: original.version + 1,
            groups: groups.write,
            values: write_values,
            policies: write_policies,
            mod_policy: updated.mod_policy.clone(),
        },
        updated: true,
    }
}

fn version_only(version: u64) -> ConfigGroup {
    ConfigGroup {
        version,
        ..ConfigGroup::default()
    }
}

/// A copy of `group` with every version reset to 0, for subtrees that are new.
fn fresh_group(group: &ConfigGroup) -> ConfigGroup {
    ConfigGroup {
        version: 0,
        groups: group
            .groups
            .iter()
            .map(|(name, g)| (name.clone(), fresh_group(g)))
            .collect(),
        values: group
            .values
            .iter()
            .map(|(name, v)| (name.clone(), ConfigValue::rewrite(v, 0)))
            .collect(),
        policies: group
            .policies
            .iter()
            .map(|(name, p)| (name.clone(), ConfigPolicy::rewrite(p, 0)))
            .collect(),
        mod_policy: group.mod_policy.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyValue;
    use crate::proto::common::ImplicitMetaRule;
    use crate::tree;

    fn leaf_group(seed: u8) -> ConfigGroup {
        let mut g = tree::new_group_with_mod_policy("Admins");
        tree::set_value(&mut g, "Alpha", vec![seed], "Admins");
        tree::set_value(&mut g, "Beta", vec![seed, seed], "Admins");
        tree::set_policy(
            &mut g,
            "Readers",
            &PolicyValue::implicit_meta(ImplicitMetaRule::Any, "Readers"),
            "Admins",
        );
        g
    }

    /// root → A → B → C, plus an untouched sibling D under the root.
    fn nested() -> ConfigGroup {
        let mut b = leaf_group(2);
        b.groups.insert("C".into(), leaf_group(3));
        let mut a = leaf_group(1);
        a.groups.insert("B".into(), b);
        let mut root = leaf_group(0);
        root.groups.insert("A".into(), a);
        root.groups.insert("D".into(), leaf_group(4));
        root
    }

    fn config(group: ConfigGroup) -> Config {
        Config {
            sequence: 0,
            channel_group: Some(group),
        }
    }

    fn c_mut(root: &mut ConfigGroup) -> &mut ConfigGroup {
        root.groups
            .get_mut("A")
            .and_then(|a| a.groups.get_mut("B"))
            .and_then(|b| b.groups.get_mut("C"))
            .unwrap()
    }

    #[test]
    fn test_identical_trees_fail() {
        let err = compute(&config(nested()), &config(nested())).unwrap_err();
        assert!(matches!(err, ConfigTxError::NoDifferences));
        assert!(compute_group_update(&tree::new_group(), &tree::new_group()).is_err());
    }

    #[test]
    fn test_missing_channel_group() {
        let err = compute(&Config::default(), &config(nested())).unwrap_err();
        assert!(err.to_string().contains("original"));
    }

    #[test]
    fn test_single_leaf_change_is_minimal() {
        let original = nested();
        let mut updated = nested();
        c_mut(&mut updated).values.get_mut("Alpha").unwrap().value = vec![99];

        let update = compute(&config(original), &config(updated)).unwrap();
        let write = update.write_set.unwrap();
        let read = update.read_set.unwrap();

        assert_eq!(write.groups.keys().collect::<Vec<_>>(), vec!["A"]);
        assert!(!read.groups.contains_key("D"));
        let c_write = tree::group_at(&write, &["A", "B", "C"]).unwrap();
        assert_eq!(c_write.values["Alpha"].value, vec![99]);
        assert_eq!(c_write.values["Alpha"].version, 1);
        let c_read = tree::group_at(&read, &["A", "B", "C"]).unwrap();
        assert_eq!(c_read.values["Alpha"].version, 0);
        assert!(c_read.values["Alpha"].value.is_empty());

        for path in [&[][..], &["A"][..], &["A", "B"][..], &["A", "B", "C"][..]] {
            let w = tree::group_at(&write, path).unwrap();
            let r = tree::group_at(&read, path).unwrap();
            assert_eq!(w.version, r.version + 1, "path {path:?}");
            assert_eq!(w.mod_policy, "Admins");
        }
    }

    #[test]
    fn test_unchanged_leaves_repeated_at_included_level() {
        let mut updated = nested();
        c_mut(&mut updated).values.get_mut("Alpha").unwrap().value = vec![99];
        let original = nested();
        let update = compute_group_update(&original, &updated).unwrap();

        let c_write = tree::group_at(update.write_set.as_ref().unwrap(), &["A", "B", "C"]).unwrap();
        let c_read = tree::group_at(update.read_set.as_ref().unwrap(), &["A", "B", "C"]).unwrap();
        let beta = &original.groups["A"].groups["B"].groups["C"].values["Beta"];
        assert_eq!(&c_write.values["Beta"], beta);
        assert_eq!(&c_read.values["Beta"], beta);
        assert!(c_write.policies.contains_key("Readers"));
    }

    #[test]
    fn test_added_group_propagates_membership() {
        let mut original = nested();
        original.groups.insert("Application".into(), leaf_group(5));
        let mut updated = original.clone();
        let mut org = leaf_group(6);
        org.version = 7;
        org.values.get_mut("Alpha").unwrap().version = 3;
        updated
            .groups
            .get_mut("Application")
            .unwrap()
            .groups
            .insert("Org3".into(), org);

        let update = compute_group_update(&original, &updated).unwrap();
        let write = update.write_set.unwrap();
        assert_eq!(write.version, 1);
        let app = &write.groups["Application"];
        assert_eq!(app.version, 1);
        let org = &app.groups["Org3"];
        assert_eq!(org.version, 0);
        assert_eq!(org.values["Alpha"].version, 0);
        assert_eq!(org.values["Alpha"].value, vec![6]);
        assert!(!write.groups.contains_key("A"));
        assert!(!update.read_set.unwrap().groups["Application"].groups.contains_key("Org3"));
    }

    #[test]
    fn test_removed_value_marks_membership() {
        let original = nested();
        let mut updated = nested();
        updated.groups.get_mut("D").unwrap().values.remove("Beta");

        let update = compute_group_update(&original, &updated).unwrap();
        let d = &update.write_set.unwrap().groups["D"];
        assert_eq!(d.version, 1);
        assert!(!d.values.contains_key("Beta"));
        assert!(d.values.contains_key("Alpha"));
    }

    #[test]
    fn test_mod_policy_change_alone() {
        let original = nested();
        let mut updated = nested();
        updated.groups.get_mut("D").unwrap().mod_policy = "Writers".into();

        let update = compute_group_update(&original, &updated).unwrap();
        let write = update.write_set.unwrap();
        assert_eq!(write.groups["D"].mod_policy, "Writers");
        assert_eq!(write.groups["D"].version, 1);
        assert_eq!(update.read_set.unwrap().groups["D"].version, 0);
    }

    #[test]
    fn test_leaf_mod_policy_change_alone() {
        let original = nested();
        let mut updated = nested();
        let d = updated.groups.get_mut("D").unwrap();
        d.values.get_mut("Alpha").unwrap().mod_policy = "Writers".into();
        d.policies.get_mut("Readers").unwrap().mod_policy = "Writers".into();

        let update = compute_group_update(&original, &updated).unwrap();
        let write = update.write_set.unwrap();
        let read = update.read_set.unwrap();
        let (wd, rd) = (&write.groups["D"], &read.groups["D"]);
        assert_eq!(wd.values["Alpha"].mod_policy, "Writers");
        assert_eq!(wd.values["Alpha"].value, vec![4]);
        assert_eq!(wd.values["Alpha"].version, 1);
        assert_eq!(rd.values["Alpha"].version, 0);
        assert_eq!(wd.policies["Readers"].mod_policy, "Writers");
        assert_eq!(wd.policies["Readers"].version, 1);
        assert_eq!(rd.policies["Readers"].version, 0);
        // Untouched sibling leaf is repeated at its old version.
        assert_eq!(wd.values["Beta"].version, 0);
        assert!(!write.groups.contains_key("A"));
    }

    #[test]
    fn test_policy_modification() {
        let original = nested();
        let mut updated = nested();
        tree::set_policy(
            &mut updated,
            "Readers",
            &PolicyValue::implicit_meta(ImplicitMetaRule::All, "Readers"),
            "Admins",
        );
        let update = compute_group_update(&original, &updated).unwrap();
        let write = update.write_set.unwrap();
        let read = update.read_set.unwrap();
        assert_eq!(write.policies["Readers"].version, read.policies["Readers"].version + 1);
        assert!(read.policies["Readers"].policy.is_none());
        assert!(write.groups.is_empty());
    }

    #[test]
    fn test_versions_build_on_original() {
        let mut original = nested();
        original.version = 4;
        original.groups.get_mut("D").unwrap().version = 9;
        original.groups.get_mut("D").unwrap().values.get_mut("Alpha").unwrap().version = 2;
        let mut updated = original.clone();
        updated.groups.get_mut("D").unwrap().values.get_mut("Alpha").unwrap().value = vec![0xff];

        let update = compute_group_update(&original, &updated).unwrap();
        let write = update.write_set.unwrap();
        assert_eq!(write.version, 5);
        assert_eq!(write.groups["D"].version, 10);
        assert_eq!(write.groups["D"].values["Alpha"].version, 3);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let mut updated = nested();
        c_mut(&mut updated).mod_policy = "Writers".into();
        updated.groups.remove("D");
        let first = compute_group_update(&nested(), &updated).unwrap();
        let second = compute_group_update(&nested(), &updated).unwrap();
        assert_eq!(first, second);
    }
}
