//! JSON-Schema subset used by [`super::InMemoryTypeSystem`].
//!
//! Supported keywords: `type`, `required`, `properties`,
//! `additionalProperties: false`, `items`, `enum`, `const`, `minimum`,
//! `maximum`, `exclusiveMinimum`, `minLength`, `minItems`. Unknown keywords
//! are ignored.

use serde_json::{Map, Value};

use super::{ValidationError, ValidationResult};

/// Validate `instance` against `schema`.
pub fn validate_value(schema: &Value, instance: &Value) -> ValidationResult {
    let mut errors = Vec::new();
    check(schema, instance, "", &mut errors);
    ValidationResult::from_errors(errors)
}

fn check(schema: &Value, instance: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let schema = match schema {
        Value::Bool(true) => return,
        Value::Bool(false) => {
            errors.push(ValidationError::new(path, "no value is allowed here"));
            return;
        }
        Value::Object(map) => map,
        _ => return,
    };

    if let Some(expected) = schema.get("type") {
        if !type_matches(expected, instance) {
            errors.push(ValidationError::new(
                path,
                format!("expected {}, found {}", expected_label(expected), type_name(instance)),
            ));
            return;
        }
    }

    if let Some(constant) = schema.get("const") {
        if constant != instance {
            errors.push(ValidationError::new(path, format!("must equal {}", constant)));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(instance) {
            errors.push(ValidationError::new(
                path,
                format!("{} is not one of the allowed values", instance),
            ));
        }
    }

    match instance {
        Value::Object(map) => check_object(schema, map, path, errors),
        Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    errors.push(ValidationError::new(
                        path,
                        format!("expected at least {} items", min),
                    ));
                }
            }
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{}[{}]", path, i), errors);
                }
            }
        }
        Value::String(s) => {
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if (s.chars().count() as u64) < min {
                    errors.push(ValidationError::new(
                        path,
                        format!("expected at least {} characters", min),
                    ));
                }
            }
        }
        Value::Number(n) => {
            let Some(v) = n.as_f64() else { return };
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if v < min {
                    errors.push(ValidationError::new(path, format!("must be >= {}", min)));
                }
            }
            if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
                if v <= min {
                    errors.push(ValidationError::new(path, format!("must be > {}", min)));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if v > max {
                    errors.push(ValidationError::new(path, format!("must be <= {}", max)));
                }
            }
        }
        _ => {}
    }
}

fn check_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(name) {
                errors.push(ValidationError::new(
                    join_path(path, name),
                    format!("required property '{}' is missing", name),
                ));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    if let Some(properties) = properties {
        for (name, sub_schema) in properties {
            if let Some(value) = map.get(name) {
                check(sub_schema, value, &join_path(path, name), errors);
            }
        }
    }

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        for key in map.keys() {
            if !properties.is_some_and(|p| p.contains_key(key)) {
                errors.push(ValidationError::new(
                    join_path(path, key),
                    "unexpected property",
                ));
            }
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_matches(expected: &Value, instance: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, instance)),
        _ => true,
    }
}

fn single_type_matches(name: &str, instance: &Value) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => true,
    }
}

fn expected_label(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
