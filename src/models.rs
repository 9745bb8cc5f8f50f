//! Request models - Schema checks at the endpoint boundary
//!
//! TigerStyle: Documents are schema-less in the store; requests are not.
//! Each body is checked here before it reaches the facade, and extra fields
//! the dashboard sends along are kept as-is.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use finguard_store::Fields;

use crate::TEXT_FIELD_BYTES_MAX;

// =============================================================================
// Errors
// =============================================================================

/// A request body that fails its schema check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Body is JSON but not an object
    #[error("request body must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    /// Body does not match the request shape
    #[error("invalid request body: {0}")]
    Malformed(String),

    /// Required text is blank
    #[error("field {field} cannot be empty")]
    EmptyField { field: &'static str },

    /// Text over the length limit
    #[error("field {field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Known key with the wrong JSON type
    #[error("field {field} must be {expected}")]
    WrongType { field: String, expected: &'static str },
}

/// JSON type name for error messages.
#[must_use]
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn require_object(value: Value) -> Result<Fields, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::NotAnObject {
            found: json_type(&other),
        }),
    }
}

/// Trim a required text field and check its bounds.
fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if trimmed.len() > TEXT_FIELD_BYTES_MAX {
        return Err(ValidationError::FieldTooLong {
            field,
            len: trimmed.len(),
            max: TEXT_FIELD_BYTES_MAX,
        });
    }
    Ok(trimmed.to_string())
}

/// Customer ids arrive as strings or bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "customer id must be a string or number, got {}",
            json_type(&other)
        ))),
    }
}

// =============================================================================
// Flagged Customers
// =============================================================================

/// Review priority of a flagged customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "critical", alias = "CRITICAL")]
    Critical,
    #[default]
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl Priority {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Body of `POST /flagged-customers`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagCustomerRequest {
    /// Customer being flagged (`id` accepted too)
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub customer_id: String,
    /// Customer display name
    pub name: String,
    /// Why the customer was flagged
    pub reason: String,
    /// Review priority, `High` when omitted
    #[serde(default)]
    pub priority: Priority,
    /// Anything else the dashboard sent
    #[serde(flatten)]
    pub extra: Fields,
}

impl FlagCustomerRequest {
    /// Parse and check a request body.
    ///
    /// # Errors
    /// Returns error if the body is not an object, misses a required field,
    /// or has an empty or oversized text field.
    pub fn parse(body: Value) -> Result<Self, ValidationError> {
        let object = require_object(body)?;
        let mut request: Self = serde_json::from_value(Value::Object(object))
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        request.customer_id = require_text("customerId", &request.customer_id)?;
        request.name = require_text("name", &request.name)?;
        request.reason = require_text("reason", &request.reason)?;
        Ok(request)
    }

    /// Document fields to store. Checked fields override extras.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        let mut fields = self.extra;
        fields.insert("customerId".to_string(), Value::String(self.customer_id));
        fields.insert("name".to_string(), Value::String(self.name));
        fields.insert("reason".to_string(), Value::String(self.reason));
        fields.insert(
            "priority".to_string(),
            Value::String(self.priority.as_str().to_string()),
        );
        fields
    }
}

// =============================================================================
// Interventions
// =============================================================================

/// Outcome recorded for an intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionStatus {
    /// Signed off and carried out
    #[default]
    #[serde(alias = "approved")]
    Approved,
    /// Passed up for review
    #[serde(alias = "escalated")]
    Escalated,
    /// Awaiting a decision
    #[serde(alias = "pending")]
    Pending,
    /// Turned down
    #[serde(alias = "rejected")]
    Rejected,
}

impl InterventionStatus {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Escalated => "ESCALATED",
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Body of `POST /interventions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRequest {
    /// Customer (or bulk campaign id) the intervention targets
    #[serde(deserialize_with = "string_or_number")]
    pub customer_id: String,
    /// Customer display name or segment
    pub customer_name: String,
    /// Recommended action
    pub intervention: String,
    /// Outcome, `APPROVED` when omitted
    #[serde(default)]
    pub status: InterventionStatus,
    /// Anything else the dashboard sent
    #[serde(flatten)]
    pub extra: Fields,
}

impl InterventionRequest {
    /// Parse and check a request body.
    ///
    /// # Errors
    /// Returns error if the body is not an object, misses a required field,
    /// or has an empty or oversized text field.
    pub fn parse(body: Value) -> Result<Self, ValidationError> {
        let object = require_object(body)?;
        let mut request: Self = serde_json::from_value(Value::Object(object))
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        request.customer_id = require_text("customerId", &request.customer_id)?;
        request.customer_name = require_text("customerName", &request.customer_name)?;
        request.intervention = require_text("intervention", &request.intervention)?;
        Ok(request)
    }

    /// Document fields to store. Checked fields override extras.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        let mut fields = self.extra;
        fields.insert("customerId".to_string(), Value::String(self.customer_id));
        fields.insert("customerName".to_string(), Value::String(self.customer_name));
        fields.insert("intervention".to_string(), Value::String(self.intervention));
        fields.insert(
            "status".to_string(),
            Value::String(self.status.as_str().to_string()),
        );
        fields
    }
}

// =============================================================================
// Alert Settings
// =============================================================================

/// Check a settings patch. Unknown keys pass through; known keys must have
/// the right shape.
///
/// Known keys: `thresholds` (map of numbers), `notifications` (map of
/// booleans), `autoEscalate` (boolean), and the flat `*Threshold` (number)
/// and `*Enabled` (boolean) keys the settings form sends.
///
/// # Errors
/// Returns error if the body is not an object or a known key is mistyped.
pub fn parse_settings_patch(body: Value) -> Result<Fields, ValidationError> {
    let patch = require_object(body)?;

    for (key, value) in &patch {
        match key.as_str() {
            "thresholds" => require_map_of(key, value, Value::is_number, "a map of numbers")?,
            "notifications" => require_map_of(key, value, Value::is_boolean, "a map of booleans")?,
            "autoEscalate" => require(key, value, Value::is_boolean, "a boolean")?,
            k if k.ends_with("Threshold") => require(key, value, Value::is_number, "a number")?,
            k if k.ends_with("Enabled") => require(key, value, Value::is_boolean, "a boolean")?,
            _ => {}
        }
    }

    Ok(patch)
}

fn require(
    field: &str,
    value: &Value,
    check: fn(&Value) -> bool,
    expected: &'static str,
) -> Result<(), ValidationError> {
    if check(value) {
        Ok(())
    } else {
        Err(ValidationError::WrongType {
            field: field.to_string(),
            expected,
        })
    }
}

fn require_map_of(
    field: &str,
    value: &Value,
    check: fn(&Value) -> bool,
    expected: &'static str,
) -> Result<(), ValidationError> {
    let valid = value
        .as_object()
        .is_some_and(|map| map.values().all(check));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::WrongType {
            field: field.to_string(),
            expected,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_request_from_dashboard_form() {
        let request = FlagCustomerRequest::parse(json!({
            "customerId": "CUST-1042",
            "name": "  Asha Rao ",
            "reason": "Missed two payments",
            "priority": "Critical"
        }))
        .unwrap();

        assert_eq!(request.name, "Asha Rao");
        assert_eq!(request.priority, Priority::Critical);

        let fields = request.into_fields();
        assert_eq!(fields["customerId"], "CUST-1042");
        assert_eq!(fields["priority"], "Critical");
    }

    #[test]
    fn test_flag_request_id_alias_and_defaults() {
        let request = FlagCustomerRequest::parse(json!({
            "id": 1042,
            "name": "Asha Rao",
            "reason": "Utilization spike",
            "segment": "Retail"
        }))
        .unwrap();

        assert_eq!(request.customer_id, "1042");
        assert_eq!(request.priority, Priority::High);
        assert_eq!(request.extra["segment"], "Retail");
    }

    #[test]
    fn test_flag_request_rejections() {
        assert_eq!(
            FlagCustomerRequest::parse(json!(["not", "an", "object"])),
            Err(ValidationError::NotAnObject { found: "an array" })
        );
        assert!(matches!(
            FlagCustomerRequest::parse(json!({"name": "A", "reason": "B"})),
            Err(ValidationError::Malformed(_))
        ));
        assert_eq!(
            FlagCustomerRequest::parse(json!({"customerId": "C1", "name": "  ", "reason": "B"})),
            Err(ValidationError::EmptyField { field: "name" })
        );
        assert!(matches!(
            FlagCustomerRequest::parse(
                json!({"customerId": "C1", "name": "A", "reason": "B", "priority": "Urgent"})
            ),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_intervention_request() {
        let request = InterventionRequest::parse(json!({
            "customerId": "BULK-PAYMENT-HOLIDAY",
            "customerName": "Stressed Mortgages",
            "intervention": "Payment holiday outreach",
            "status": "ESCALATED"
        }))
        .unwrap();
        assert_eq!(request.status, InterventionStatus::Escalated);

        let fields = request.into_fields();
        assert_eq!(fields["status"], "ESCALATED");
        assert_eq!(fields["customerName"], "Stressed Mortgages");
    }

    #[test]
    fn test_intervention_status_defaults_to_approved() {
        let request = InterventionRequest::parse(json!({
            "customerId": "C9",
            "customerName": "Ravi",
            "intervention": "Call"
        }))
        .unwrap();
        assert_eq!(request.status, InterventionStatus::Approved);
    }

    #[test]
    fn test_text_field_too_long() {
        let err = InterventionRequest::parse(json!({
            "customerId": "C9",
            "customerName": "Ravi",
            "intervention": "x".repeat(TEXT_FIELD_BYTES_MAX + 1)
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::FieldTooLong { field: "intervention", .. }));
    }

    #[test]
    fn test_settings_patch_shapes() {
        let patch = parse_settings_patch(json!({
            "criticalThreshold": 80,
            "emailEnabled": true,
            "autoEscalate": false,
            "thresholds": {"riskScore": 70},
            "theme": "dark"
        }))
        .unwrap();
        assert_eq!(patch.len(), 5);

        assert_eq!(
            parse_settings_patch(json!({"highThreshold": "60"})),
            Err(ValidationError::WrongType {
                field: "highThreshold".to_string(),
                expected: "a number"
            })
        );
        assert!(parse_settings_patch(json!({"notifications": {"email": "yes"}})).is_err());
        assert!(parse_settings_patch(json!(42)).is_err());
    }
}
