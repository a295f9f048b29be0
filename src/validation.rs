//! Schema validation of declarative configuration.
//!
//! Checks a `serde_json::Value` against a [`Schema`]: presence of required
//! attributes, value types, block cardinality and the per-attribute
//! [`AttributeValidator`]s. Cross-field rules specific to one resource type
//! (such as webhook criteria) live with that resource.
//!
//! # Example
//!
//! ```
//! use artifactory_provider::schema::{Attribute, Schema};
//! use artifactory_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("key", Attribute::required_string())
//!     .with_attribute("enabled", Attribute::optional_bool());
//!
//! assert!(validate(&schema, &json!({"key": "hook"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"key": "hook", "enabled": "yes"}));
//! assert_eq!(diagnostics.len(), 1);
//! ```

use crate::schema::{
    Attribute, AttributeType, AttributeValidator, Block, Diagnostic, Diagnostics, NestedBlock,
    Schema,
};
use serde_json::Value;
use std::collections::HashSet;

/// Validate a JSON value against a schema.
///
/// Returns every problem found. Deprecated attributes that are set produce
/// warnings, everything else produces errors.
pub fn validate(schema: &Schema, value: &Value) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning `Err` if any error was found.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Diagnostics> {
    validate(schema, value).into_result(())
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    !validate(schema, value).has_errors()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Diagnostics) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    let mut names: Vec<&String> = block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr_path = join_path(path, name);
        validate_attribute(&block.attributes[name], obj.get(name), &attr_path, diagnostics);
    }

    let mut names: Vec<&String> = block.blocks.keys().collect();
    names.sort();
    for name in names {
        let block_path = join_path(path, name);
        validate_nested_block(&block.blocks[name], obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Diagnostics,
) {
    // Computed-only attributes are owned by the provider.
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    let value = match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    if let Some(message) = &attr.deprecated {
        diagnostics.push(
            Diagnostic::warning(format!("Attribute '{}' is deprecated", path))
                .with_detail(message.clone())
                .with_attribute(path),
        );
    }

    if validate_type(&attr.attr_type, value, path, diagnostics) {
        for validator in &attr.validators {
            apply_validator(validator, value, path, diagnostics);
        }
    }
}

/// Returns `true` if the value had the right type (so validators can run).
fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Diagnostics,
) -> bool {
    let before = diagnostics.len();
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if value.as_i64().is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                for (i, elem) in arr.iter().enumerate() {
                    validate_type(element_type, elem, &format!("{}.{}", path, i), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Set(element_type) => match value.as_array() {
            Some(arr) => {
                let mut seen = HashSet::new();
                for (i, elem) in arr.iter().enumerate() {
                    validate_type(element_type, elem, &format!("{}.{}", path, i), diagnostics);
                    if !seen.insert(elem.to_string()) {
                        diagnostics.push(
                            Diagnostic::error(format!("Duplicate set element in '{}'", path))
                                .with_detail(format!("Value {} appears more than once", elem))
                                .with_attribute(path),
                        );
                    }
                }
            },
            None => diagnostics.push(type_error(path, "set", value)),
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(obj) => {
                for (key, val) in obj {
                    validate_type(value_type, val, &format!("{}.{}", path, key), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
    }
    diagnostics.len() == before
}

/// Whether `s` can be placed in a URL path as a single segment.
pub(crate) fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%' | '\\'))
}

fn apply_validator(
    validator: &AttributeValidator,
    value: &Value,
    path: &str,
    diagnostics: &mut Diagnostics,
) {
    match validator {
        AttributeValidator::StringNotEmpty => {
            if value.as_str().is_some_and(str::is_empty) {
                diagnostics.add_attribute_error(
                    path,
                    "Invalid Attribute Value",
                    format!("{} must not be empty", path),
                );
            }
        },
        AttributeValidator::StringLengthBetween { min, max } => {
            if let Some(s) = value.as_str() {
                let len = s.chars().count();
                if len < *min || len > *max {
                    diagnostics.add_attribute_error(
                        path,
                        "Invalid Attribute Value Length",
                        format!(
                            "{} string length must be between {} and {}, got: {}",
                            path, min, max, len
                        ),
                    );
                }
            }
        },
        AttributeValidator::UrlWithHttpOrHttps => {
            if let Some(s) = value.as_str() {
                let ok = url::Url::parse(s)
                    .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
                    .unwrap_or(false);
                if !ok {
                    diagnostics.add_attribute_error(
                        path,
                        "Invalid URL",
                        format!("expected {} to have a url with schema of: \"http,https\", got {}", path, s),
                    );
                }
            }
        },
        AttributeValidator::PathSegment => {
            if let Some(s) = value.as_str() {
                if !is_path_segment(s) {
                    diagnostics.add_attribute_error(
                        path,
                        "Invalid Attribute Value",
                        format!(
                            "{} cannot contain spaces or any of '/', '?', '#', '%', got: \"{}\"",
                            path, s
                        ),
                    );
                }
            }
        },
        AttributeValidator::OneOf(allowed) => {
            let candidates: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(arr) => arr.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            for candidate in candidates {
                if !allowed.iter().any(|a| a == candidate) {
                    diagnostics.add_attribute_error(
                        path,
                        "Invalid Attribute Value Match",
                        format!(
                            "{} value must be one of: [{}], got: \"{}\"",
                            path,
                            allowed.join(", "),
                            candidate
                        ),
                    );
                }
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Diagnostics,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        // A lone object is accepted for single blocks.
        Some(v @ Value::Object(_)) if nested.max_items == 1 => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
        .with_attribute(path)
}
