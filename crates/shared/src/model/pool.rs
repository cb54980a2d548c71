use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidProfile {
    Single,
    Raid1,
    Raid10,
}

impl RaidProfile {
    /// Minimum device count for the profile, per the RAID validation rules.
    pub fn min_devices(self) -> usize {
        match self {
            RaidProfile::Single => 1,
            RaidProfile::Raid1 => 2,
            RaidProfile::Raid10 => 4,
        }
    }

    pub fn requires_even_devices(self) -> bool {
        matches!(self, RaidProfile::Raid10)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub uuid: Uuid,
    pub label: String,
    pub mountpoint: String,
    pub raid: RaidProfile,
    pub devices: Vec<String>,
    pub subvolumes: Vec<String>,
    pub mount_options: String,
}

/// Sorted-device-sizes capacity estimate, bytes. Mirrors the plan-side
/// estimate described for pool create: single sums, raid1 takes the
/// minimum, raid10 takes the minimum pair size times pair count.
pub fn estimate_capacity(raid: RaidProfile, device_sizes: &[u64]) -> u64 {
    if device_sizes.is_empty() {
        return 0;
    }
    let mut sorted = device_sizes.to_vec();
    sorted.sort_unstable();
    match raid {
        RaidProfile::Single => sorted.iter().sum(),
        RaidProfile::Raid1 => *sorted.first().unwrap(),
        RaidProfile::Raid10 => {
            let pairs = sorted.len() / 2;
            let min_pair = *sorted.first().unwrap();
            min_pair * pairs as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raid1_min_devices() {
        assert_eq!(RaidProfile::Raid1.min_devices(), 2);
    }

    #[test]
    fn raid10_requires_even() {
        assert!(RaidProfile::Raid10.requires_even_devices());
        assert!(!RaidProfile::Raid1.requires_even_devices());
    }

    #[test]
    fn capacity_single_sums() {
        assert_eq!(estimate_capacity(RaidProfile::Single, &[100, 200, 300]), 600);
    }

    #[test]
    fn capacity_raid1_takes_min() {
        assert_eq!(estimate_capacity(RaidProfile::Raid1, &[100, 300]), 100);
    }

    #[test]
    fn capacity_raid10_takes_min_pair_times_pair_count() {
        assert_eq!(
            estimate_capacity(RaidProfile::Raid10, &[100, 100, 200, 300]),
            200
        );
    }
}
