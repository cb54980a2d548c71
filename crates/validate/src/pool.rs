use shared::error::ErrorCode;
use shared::model::RaidProfile;

use crate::ValidationError;

/// `^[A-Za-z0-9_-]{1,32}$`
pub fn validate_pool_label(label: &str) -> Result<(), ValidationError> {
    let ok = !label.is_empty()
        && label.len() <= 32
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(
            ErrorCode::ValidationPoolLabelInvalid,
            format!("pool label {label:?} must match ^[A-Za-z0-9_-]{{1,32}}$"),
        ))
    }
}

/// raid1 needs >=2 devices, raid10 needs >=4 and an even count.
pub fn validate_raid_device_count(raid: RaidProfile, device_count: usize) -> Result<(), ValidationError> {
    if device_count < raid.min_devices() {
        return Err(ValidationError::new(
            ErrorCode::ValidationPoolDeviceCount,
            format!(
                "{raid:?} requires at least {} devices, got {device_count}",
                raid.min_devices()
            ),
        ));
    }
    if raid.requires_even_devices() && device_count % 2 != 0 {
        return Err(ValidationError::new(
            ErrorCode::ValidationPoolDeviceCount,
            format!("{raid:?} requires an even device count, got {device_count}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_label() {
        assert!(validate_pool_label("tank-01").is_ok());
    }

    #[test]
    fn rejects_empty_label() {
        assert!(validate_pool_label("").is_err());
    }

    #[test]
    fn rejects_over_length_label() {
        assert!(validate_pool_label(&"a".repeat(33)).is_err());
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(validate_pool_label("tank 01").is_err());
        assert!(validate_pool_label("tank/01").is_err());
    }

    #[test]
    fn raid1_rejects_single_device() {
        assert!(validate_raid_device_count(RaidProfile::Raid1, 1).is_err());
        assert!(validate_raid_device_count(RaidProfile::Raid1, 2).is_ok());
    }

    #[test]
    fn raid10_rejects_under_four() {
        assert!(validate_raid_device_count(RaidProfile::Raid10, 3).is_err());
    }

    #[test]
    fn raid10_rejects_odd_count() {
        assert!(validate_raid_device_count(RaidProfile::Raid10, 5).is_err());
        assert!(validate_raid_device_count(RaidProfile::Raid10, 4).is_ok());
    }

    #[test]
    fn single_accepts_one_device() {
        assert!(validate_raid_device_count(RaidProfile::Single, 1).is_ok());
    }
}
