//! Typed access to configuration and state objects.
//!
//! Configuration arrives as untyped JSON. [`ObjectReader`] pulls typed values
//! out of one object while recording type mismatches as diagnostics, so a
//! model can be read in full and every problem reported at once. Unset
//! optional values come back as `None`, keeping "not provided" distinct from
//! "empty".

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::schema::{Diagnostic, Diagnostics};
use crate::validation::type_name;

/// Reads typed attributes from one JSON object.
#[derive(Debug, Clone)]
pub struct ObjectReader<'a> {
    obj: &'a Map<String, Value>,
    path: String,
}

impl<'a> ObjectReader<'a> {
    /// Wrap `value`, which must be an object.
    ///
    /// Records an error and returns `None` otherwise.
    pub fn new(value: &'a Value, path: impl Into<String>, diags: &mut Diagnostics) -> Option<Self> {
        let path = path.into();
        match value {
            Value::Object(obj) => Some(Self { obj, path }),
            other => {
                let mut diag = Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", type_name(other)));
                if !path.is_empty() {
                    diag = diag.with_attribute(path);
                }
                diags.push(diag);
                None
            },
        }
    }

    /// The dotted path of this object.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of a child attribute.
    pub fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    /// Raw access to an attribute; null counts as absent.
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.obj.get(name).filter(|v| !v.is_null())
    }

    /// Optional string attribute.
    pub fn string(&self, name: &str, diags: &mut Diagnostics) -> Option<String> {
        match self.raw(name)? {
            Value::String(s) => Some(s.clone()),
            other => {
                diags.push(self.mismatch(name, "string", other));
                None
            },
        }
    }

    /// Required string attribute.
    pub fn required_string(&self, name: &str, diags: &mut Diagnostics) -> Option<String> {
        if self.raw(name).is_none() {
            diags.push(self.missing(name));
            return None;
        }
        self.string(name, diags)
    }

    /// Optional bool attribute.
    pub fn bool(&self, name: &str, diags: &mut Diagnostics) -> Option<bool> {
        match self.raw(name)? {
            Value::Bool(b) => Some(*b),
            other => {
                diags.push(self.mismatch(name, "bool", other));
                None
            },
        }
    }

    /// Bool attribute falling back to `default` when unset.
    pub fn bool_or(&self, name: &str, default: bool, diags: &mut Diagnostics) -> bool {
        self.bool(name, diags).unwrap_or(default)
    }

    /// Optional int64 attribute.
    pub fn int64(&self, name: &str, diags: &mut Diagnostics) -> Option<i64> {
        let value = self.raw(name)?;
        match value.as_i64() {
            Some(i) => Some(i),
            None => {
                diags.push(self.mismatch(name, "int64", value));
                None
            },
        }
    }

    /// Optional set of strings.
    pub fn string_set(&self, name: &str, diags: &mut Diagnostics) -> Option<BTreeSet<String>> {
        let value = self.raw(name)?;
        let Some(items) = value.as_array() else {
            diags.push(self.mismatch(name, "set", value));
            return None;
        };

        let mut set = BTreeSet::new();
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => {
                    set.insert(s.to_string());
                },
                None => diags.push(
                    Diagnostic::error(format!("Invalid type for attribute '{}.{}'", self.child_path(name), i))
                        .with_detail(format!("Expected string, got {}", type_name(item)))
                        .with_attribute(format!("{}.{}", self.child_path(name), i)),
                ),
            }
        }
        Some(set)
    }

    /// Optional map of strings.
    pub fn string_map(
        &self,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<BTreeMap<String, String>> {
        let value = self.raw(name)?;
        let Some(obj) = value.as_object() else {
            diags.push(self.mismatch(name, "map", value));
            return None;
        };

        let mut map = BTreeMap::new();
        for (key, item) in obj {
            match item.as_str() {
                Some(s) => {
                    map.insert(key.clone(), s.to_string());
                },
                None => diags.push(
                    Diagnostic::error(format!("Invalid type for attribute '{}.{}'", self.child_path(name), key))
                        .with_detail(format!("Expected string, got {}", type_name(item)))
                        .with_attribute(format!("{}.{}", self.child_path(name), key)),
                ),
            }
        }
        Some(map)
    }

    /// Elements of a nested block (list or set). A lone object counts as one element.
    pub fn blocks(&self, name: &str, diags: &mut Diagnostics) -> Vec<&'a Value> {
        match self.raw(name) {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(obj @ Value::Object(_)) => vec![obj],
            Some(other) => {
                diags.push(self.mismatch(name, "block list", other));
                Vec::new()
            },
        }
    }

    fn mismatch(&self, name: &str, expected: &str, got: &Value) -> Diagnostic {
        let path = self.child_path(name);
        Diagnostic::error(format!("Invalid type for attribute '{}'", path))
            .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
            .with_attribute(path)
    }

    fn missing(&self, name: &str) -> Diagnostic {
        let path = self.child_path(name);
        Diagnostic::error(format!("Missing required attribute '{}'", path))
            .with_detail("This attribute is required and must be provided")
            .with_attribute(path)
    }
}

/// A string set as state: `null` when unset, sorted array otherwise.
pub fn set_value(set: &Option<BTreeSet<String>>) -> Value {
    match set {
        None => Value::Null,
        Some(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
    }
}

/// An optional string as state.
pub fn string_value(s: &Option<String>) -> Value {
    s.clone().map(Value::String).unwrap_or(Value::Null)
}

/// An optional string map as state.
pub fn map_value(map: &Option<BTreeMap<String, String>>) -> Value {
    match map {
        None => Value::Null,
        Some(items) => Value::Object(
            items
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
    }
}
