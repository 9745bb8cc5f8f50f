//! Settings - The alert-settings singleton
//!
//! Read with defaults-merge semantics: an absent document yields the
//! defaults, a present one is layered over them.

use serde_json::{json, Value};

use crate::document::{merge_fields, Fields};

/// Default alert settings.
#[must_use]
pub fn default_settings() -> Fields {
    let defaults = json!({
        "thresholds": {
            "riskScore": 75,
            "utilization": 80,
            "delinquency": 1
        },
        "notifications": {
            "email": true,
            "slack": false,
            "sms": false
        },
        "autoEscalate": true
    });

    match defaults {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Layer stored settings over the defaults. `None` yields the defaults.
#[must_use]
pub fn settings_with_defaults(stored: Option<Fields>) -> Fields {
    let mut settings = default_settings();
    if let Some(stored) = stored {
        merge_fields(&mut settings, stored);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_exact() {
        assert_eq!(
            Value::Object(default_settings()),
            json!({
                "thresholds": {"riskScore": 75, "utilization": 80, "delinquency": 1},
                "notifications": {"email": true, "slack": false, "sms": false},
                "autoEscalate": true
            })
        );
    }

    #[test]
    fn test_stored_values_win() {
        let Value::Object(stored) = json!({
            "thresholds": {"riskScore": 60},
            "criticalThreshold": 85
        }) else {
            unreachable!()
        };

        let settings = settings_with_defaults(Some(stored));
        assert_eq!(settings["thresholds"]["riskScore"], 60);
        assert_eq!(settings["thresholds"]["utilization"], 80);
        assert_eq!(settings["criticalThreshold"], 85);
        assert_eq!(settings["autoEscalate"], true);
    }
}
