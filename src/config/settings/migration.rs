// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;

/// Bring older settings files up to the current shape.
///
/// Device entries used to name their profile `mode`.
pub(super) fn migrate_on_load(mut value: Value) -> Value {
    if let Some(devices) = value.get_mut("devices").and_then(Value::as_array_mut) {
        for device in devices.iter_mut().filter_map(Value::as_object_mut) {
            if !device.contains_key("profile") {
                if let Some(mode) = device.remove("mode") {
                    device.insert("profile".to_string(), mode);
                }
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_key_renamed() {
        let migrated = migrate_on_load(json!({
            "devices": [{"address": "10.0.0.3", "mode": "aggressive"}]
        }));
        assert_eq!(migrated["devices"][0]["profile"], "aggressive");
        assert!(migrated["devices"][0].get("mode").is_none());
    }

    #[test]
    fn test_explicit_profile_wins_over_mode() {
        let migrated = migrate_on_load(json!({
            "devices": [{"address": "10.0.0.3", "mode": "aggressive", "profile": "off"}]
        }));
        assert_eq!(migrated["devices"][0]["profile"], "off");
    }

    #[test]
    fn test_without_devices_untouched() {
        let value = json!({"controller": {"tick_interval_secs": 5}});
        assert_eq!(migrate_on_load(value.clone()), value);
    }
}
