//! Probe set and target sections, and their conversion into a [`Registry`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::registry::{Profile, Registry, Target};

use super::validation::ConfigError;

/// Link value that binds a target to every probe set.
pub const LINK_ALL: &str = "all";

/// Target definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name.
    pub name: String,

    /// Address handed to fping.
    pub address: String,

    /// Probe sets this target is measured from. Empty or `[all]` means every set.
    #[serde(default)]
    pub links: Vec<String>,
}

impl TargetConfig {
    fn links_all(&self) -> bool {
        self.links.first().is_none_or(|l| l == LINK_ALL)
    }
}

/// Resolve target links against probe sets and flatten sets into profiles.
pub fn build_registry(
    probes: &BTreeMap<String, BTreeMap<String, u8>>,
    targets: &BTreeMap<String, TargetConfig>,
) -> Result<Registry, ConfigError> {
    let mut linked: BTreeMap<&str, BTreeSet<String>> =
        probes.keys().map(|set| (set.as_str(), BTreeSet::new())).collect();

    for (id, target) in targets {
        if target.name.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "target '{id}': name cannot be empty"
            )));
        }
        if target.address.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "target '{id}': address cannot be empty"
            )));
        }

        if target.links_all() {
            for set in linked.values_mut() {
                set.insert(id.clone());
            }
            continue;
        }

        for link in &target.links {
            match linked.get_mut(link.as_str()) {
                Some(set) => {
                    set.insert(id.clone());
                }
                None => {
                    tracing::warn!(
                        target_id = %id,
                        probe_set = %link,
                        "Missing probe set linked from target, ignoring"
                    );
                }
            }
        }
    }

    let mut profiles = Vec::new();
    for (set, members) in probes {
        if members.is_empty() {
            return Err(ConfigError::invalid(format!(
                "probe set '{set}' has no probes"
            )));
        }
        let target_ids = linked.remove(set.as_str()).unwrap_or_default();
        for (probe, tos) in members {
            profiles.push(Profile {
                probe: probe.clone(),
                probe_set: set.clone(),
                tos: *tos,
                targets: target_ids.clone(),
            });
        }
    }

    let targets = targets.iter().map(|(id, t)| Target {
        id: id.clone(),
        name: t.name.clone(),
        address: t.address.clone(),
    });

    Ok(Registry::new(targets, profiles))
}
