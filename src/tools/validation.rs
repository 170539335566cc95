//! Top-level checks of tool arguments against the tool's parameter schema.

use serde_json::Value;

use crate::error::VoiceError;

/// Validate decoded arguments before a tool runs.
///
/// Checks the object shape, presence of required fields, the declared JSON
/// type of each known property, and `enum` membership when the schema lists
/// one. Nested schemas are not descended into.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), VoiceError> {
    let expects_object = schema.get("type").and_then(Value::as_str) == Some("object");
    let Some(fields) = args.as_object() else {
        if expects_object {
            return Err(invalid(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            )));
        }
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        if !fields.contains_key(name) {
            return Err(invalid(format!("missing required field '{name}'")));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in fields {
        let Some(property) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if !value_matches_type(value, expected) {
                return Err(invalid(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                )));
            }
        }
        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(invalid(format!("field '{key}' is not one of the allowed values")));
            }
        }
    }

    Ok(())
}

fn invalid(message: String) -> VoiceError {
    VoiceError::InvalidArgument(message)
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": { "type": "number" },
                "longitude": { "type": "number" },
                "unit": { "type": "string", "enum": ["celsius", "fahrenheit"] },
            },
            "required": ["latitude", "longitude"],
        })
    }

    #[test]
    fn accepts_complete_arguments() {
        let args = json!({ "latitude": 35.6, "longitude": 139.7, "unit": "celsius" });
        assert!(validate_arguments(&args, &weather_schema()).is_ok());
    }

    #[test]
    fn rejects_non_object_arguments() {
        let error = validate_arguments(&json!([1, 2]), &weather_schema()).unwrap_err();
        assert!(error.to_string().contains("expected object arguments, got array"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let error = validate_arguments(&json!({ "latitude": 35.6 }), &weather_schema()).unwrap_err();
        assert!(error.to_string().contains("missing required field 'longitude'"));
    }

    #[test]
    fn rejects_wrong_property_type() {
        let args = json!({ "latitude": "35.6", "longitude": 139.7 });
        let error = validate_arguments(&args, &weather_schema()).unwrap_err();
        assert!(error.to_string().contains("field 'latitude' expected type 'number'"));
    }

    #[test]
    fn rejects_value_outside_enum() {
        let args = json!({ "latitude": 1.0, "longitude": 2.0, "unit": "kelvin" });
        assert!(validate_arguments(&args, &weather_schema()).is_err());
    }

    #[test]
    fn ignores_properties_not_in_schema() {
        let args = json!({ "latitude": 1.0, "longitude": 2.0, "extra": true });
        assert!(validate_arguments(&args, &weather_schema()).is_ok());
    }
}
