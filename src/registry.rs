//! Immutable target and profile registries.
//!
//! Built once from configuration (see [`crate::config::AppConfig::registry`])
//! and shared read-only between workers behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Config key, reported as the `target_name` tag.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Address handed to fping (IP or hostname).
    pub address: String,
}

/// One fping configuration: a ToS value bound to a set of targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Probe name inside its set.
    pub probe: String,
    /// Name of the probe set this profile was declared in.
    pub probe_set: String,
    /// ToS / DSCP byte passed with `-O`.
    pub tos: u8,
    /// Ids of the targets linked to the probe set.
    pub targets: BTreeSet<String>,
}

impl Profile {
    /// Registry key, `<set>/<probe>`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.probe_set, self.probe)
    }
}

/// All targets and profiles of a running instance.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: BTreeMap<String, Target>,
    profiles: BTreeMap<String, Profile>,
}

impl Registry {
    pub fn new(
        targets: impl IntoIterator<Item = Target>,
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(|t| (t.id.clone(), t)).collect(),
            profiles: profiles.into_iter().map(|p| (p.id(), p)).collect(),
        }
    }

    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Targets of a profile in id order. Unknown ids are skipped.
    pub fn targets_of<'a>(&'a self, profile: &'a Profile) -> impl Iterator<Item = &'a Target> {
        profile.targets.iter().filter_map(|id| self.targets.get(id))
    }

    /// Addresses of a profile's targets, in the order fping receives them.
    pub fn addresses(&self, profile: &Profile) -> Vec<String> {
        self.targets_of(profile).map(|t| t.address.clone()).collect()
    }

    /// Address → target id, used to tag fping output with the config key.
    pub fn reverse_map(&self, profile: &Profile) -> HashMap<String, String> {
        self.targets_of(profile)
            .map(|t| (t.address.clone(), t.id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, address: &str) -> Target {
        Target {
            id: id.to_string(),
            name: id.to_uppercase(),
            address: address.to_string(),
        }
    }

    fn profile(set: &str, probe: &str, tos: u8, targets: &[&str]) -> Profile {
        Profile {
            probe: probe.to_string(),
            probe_set: set.to_string(),
            tos,
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_profile_id() {
        assert_eq!(profile("wan", "af41", 136, &[]).id(), "wan/af41");
    }

    #[test]
    fn test_addresses_and_reverse_map() {
        let registry = Registry::new(
            [target("google", "8.8.8.8"), target("cf", "1.1.1.1")],
            [profile("wan", "be", 0, &["google", "cf", "missing"])],
        );
        let p = registry.profile("wan/be").unwrap();

        // id order: cf, google; "missing" is skipped
        assert_eq!(registry.addresses(p), vec!["1.1.1.1", "8.8.8.8"]);

        let rev = registry.reverse_map(p);
        assert_eq!(rev.len(), 2);
        assert_eq!(rev.get("8.8.8.8").map(String::as_str), Some("google"));
        assert_eq!(rev.get("1.1.1.1").map(String::as_str), Some("cf"));
    }

    #[test]
    fn test_lookup() {
        let registry = Registry::new([target("google", "8.8.8.8")], []);
        assert_eq!(registry.target("google").unwrap().address, "8.8.8.8");
        assert!(registry.target("nope").is_none());
        assert_eq!(registry.profiles().count(), 0);
        assert_eq!(registry.targets().count(), 1);
    }
}
