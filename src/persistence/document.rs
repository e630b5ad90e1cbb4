//! On-disk shape of a binding profile

use crate::binding::{BindingProfile, CommandId, GameBinding, DEFAULT_PROFILE_VERSION};
use crate::input::Trigger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingEntry {
    #[serde(default)]
    pub primary_trigger: Option<Trigger>,
    #[serde(default)]
    pub modifier_trigger: Option<Trigger>,
}

/// Serialized profile. Command ids are the map keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub profile_name: String,
    #[serde(default = "default_profile_version")]
    pub profile_version: String,
    #[serde(default)]
    pub bindings: BTreeMap<CommandId, BindingEntry>,
}

fn default_profile_version() -> String {
    DEFAULT_PROFILE_VERSION.to_string()
}

impl From<&BindingProfile> for ProfileDocument {
    fn from(profile: &BindingProfile) -> Self {
        Self {
            profile_name: profile.name.clone(),
            profile_version: profile.version.clone(),
            bindings: profile
                .bindings
                .iter()
                .map(|(command, binding)| {
                    (
                        *command,
                        BindingEntry {
                            primary_trigger: binding.primary.clone(),
                            modifier_trigger: binding.modifier.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl ProfileDocument {
    /// Builds the in-memory profile. `None` when the document has no name.
    pub fn into_profile(self) -> Option<BindingProfile> {
        if self.profile_name.trim().is_empty() {
            return None;
        }

        let mut profile = BindingProfile::new(self.profile_name);
        profile.version = self.profile_version;
        profile.bindings = self
            .bindings
            .into_iter()
            .filter(|(command, _)| {
                // Aliases address another command's slot and never own an entry
                let owned = !command.is_modifier_alias();
                if !owned {
                    warn!("Skipping binding stored under alias id {}", command);
                }
                owned
            })
            .map(|(command, entry)| {
                let binding = GameBinding {
                    command,
                    primary: entry.primary_trigger,
                    modifier: entry.modifier_trigger,
                    is_active: false,
                };
                (command, binding)
            })
            .collect();
        Some(profile)
    }
}
