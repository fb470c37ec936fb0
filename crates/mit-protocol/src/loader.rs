use crate::limits::{LimitsConfig, MitLimits};
use crate::table::DeviceTable;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk limits profile.
///
/// ```yaml
/// capacity: 4
/// command:
///   pos: [-12.5, 12.5]
/// default:
///   tor: [-9.0, 9.0]
/// devices:
///   - node_id: 2
///     vel: [-30.0, 30.0]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileFile {
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Bounds for outbound command encoding.
    #[serde(default)]
    pub command: LimitsConfig,
    /// Applied to every table slot.
    #[serde(default)]
    pub default: LimitsConfig,
    /// Per-node overrides on top of `default`.
    #[serde(default)]
    pub devices: Vec<DeviceOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceOverride {
    pub node_id: u8,
    #[serde(flatten)]
    pub limits: LimitsConfig,
}

/// A resolved profile: command bounds plus a zeroed table sized and shaped
/// by the per-device limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub command_limits: MitLimits,
    pub table: DeviceTable,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            command_limits: MitLimits::DEFAULT,
            table: DeviceTable::default(),
        }
    }
}

impl ProfileFile {
    pub fn resolve(&self) -> anyhow::Result<Profile> {
        let capacity = self.capacity.unwrap_or(DeviceTable::DEFAULT_CAPACITY);
        DeviceTable::check_capacity(capacity)?;
        let command_limits = MitLimits::DEFAULT
            .overridden_by(&self.command)
            .context("command limits")?;
        let base = MitLimits::DEFAULT
            .overridden_by(&self.default)
            .context("default device limits")?;

        let mut slots = vec![base; capacity];
        for dev in &self.devices {
            let node = usize::from(dev.node_id);
            anyhow::ensure!(
                (1..=capacity).contains(&node),
                "device override for node {} outside table capacity {capacity}",
                dev.node_id
            );
            slots[node - 1] = base
                .overridden_by(&dev.limits)
                .with_context(|| format!("limits for node {}", dev.node_id))?;
        }

        Ok(Profile {
            command_limits,
            table: DeviceTable::from_profiles(slots)?,
        })
    }
}

pub fn parse_profile(yaml: &str) -> anyhow::Result<Profile> {
    let file: ProfileFile = serde_yaml::from_str(yaml).context("parsing limits profile")?;
    file.resolve()
}

pub fn load_profile_file(path: impl AsRef<Path>) -> anyhow::Result<Profile> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading profile: {}", path.display()))?;
    parse_profile(&raw).with_context(|| format!("loading profile: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_is_default() {
        let p = parse_profile("{}").unwrap();
        assert_eq!(p, Profile::default());
    }

    #[test]
    fn test_overrides_layer_onto_defaults() {
        let yaml = r#"
capacity: 3
command:
  pos: [-12.5, 12.5]
default:
  tor: [-9.0, 9.0]
devices:
  - node_id: 2
    vel: [-30.0, 30.0]
"#;
        let p = parse_profile(yaml).unwrap();
        assert_eq!(p.command_limits.pos.max(), 12.5);
        assert_eq!(p.command_limits.tor, MitLimits::DEFAULT.tor);
        assert_eq!(p.table.capacity(), 3);

        let n1 = p.table.get(1).unwrap().limits();
        assert_eq!(n1.tor.max(), 9.0);
        assert_eq!(n1.vel, MitLimits::DEFAULT.vel);

        let n2 = p.table.get(2).unwrap().limits();
        assert_eq!(n2.tor.max(), 9.0);
        assert_eq!(n2.vel.min(), -30.0);
        assert_eq!(n2.vel.bits(), 12);
    }

    #[test]
    fn test_rejects_bad_profiles() {
        assert!(parse_profile("capacity: 0").is_err());
        assert!(parse_profile("capacity: 200").is_err());
        assert!(parse_profile("devices:\n  - node_id: 5\n").is_err());
        assert!(parse_profile("devices:\n  - node_id: 0\n").is_err());
        assert!(parse_profile("command:\n  kp: [500.0, 0.0]\n").is_err());
    }
}
