//! Schema-driven planning.
//!
//! Turns a proposed configuration into a planned state and a list of
//! attribute changes against the prior state:
//!
//! - unset attributes with a schema default receive it;
//! - set-typed attributes and set blocks are put in a canonical order so
//!   that reordering in configuration is not reported as a change, and
//!   unset attributes are spelled out as `null`;
//! - computed-only attributes keep their prior value, and a computed `id`
//!   falls back to the `key` attribute;
//! - a change to any `force_new` attribute marks the plan as a replacement.

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change.
///
/// `proposed` of `null` plans a destroy.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    if proposed.is_null() {
        return plan_destroy(prior);
    }

    let mut planned = normalize(&schema.block, proposed);
    apply_defaults(&schema.block, &mut planned);
    carry_computed(&schema.block, prior, &mut planned);

    let prior = prior.map(|p| normalize(&schema.block, p));
    let mut names: Vec<&String> = schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .collect();
    names.sort();

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in names {
        let after = planned.get(name).cloned().unwrap_or(Value::Null);
        match &prior {
            None => {
                if !after.is_null() {
                    changes.push(AttributeChange::added(name.clone(), after));
                }
            },
            Some(prior) => {
                let before = prior.get(name).cloned().unwrap_or(Value::Null);
                if before == after {
                    continue;
                }
                if schema
                    .block
                    .attributes
                    .get(name)
                    .is_some_and(|attr| attr.force_new)
                {
                    requires_replace = true;
                }
                changes.push(match (before.is_null(), after.is_null()) {
                    (true, _) => AttributeChange::added(name.clone(), after),
                    (_, true) => AttributeChange::removed(name.clone(), before),
                    _ => AttributeChange::modified(name.clone(), before, after),
                });
            },
        }
    }

    if requires_replace {
        // the replacement gets fresh computed values
        if let Some(obj) = planned.as_object_mut() {
            for (name, attr) in &schema.block.attributes {
                if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
                    obj.remove(name);
                }
            }
        }
        carry_computed(&schema.block, None, &mut planned);
    }

    PlanResult::with_changes(planned, changes, requires_replace)
}

fn plan_destroy(prior: Option<&Value>) -> PlanResult {
    let changes = prior
        .and_then(Value::as_object)
        .map(|obj| {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            keys.into_iter()
                .filter(|k| !obj[*k].is_null())
                .map(|k| AttributeChange::removed(k.clone(), obj[k].clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

/// Canonical form of an object: set attributes and set blocks sorted, and
/// every attribute or block the schema declares present (`null` when unset).
pub fn normalize(block: &Block, value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };

    let mut out = Map::with_capacity(obj.len());
    for (name, v) in obj {
        let normalized = if let Some(attr) = block.attributes.get(name) {
            normalize_attribute(&attr.attr_type, v)
        } else if let Some(nested) = block.blocks.get(name) {
            match v {
                Value::Array(items) => {
                    let mut items: Vec<Value> =
                        items.iter().map(|i| normalize(&nested.block, i)).collect();
                    if nested.nesting_mode == BlockNestingMode::Set {
                        sort_values(&mut items);
                    }
                    Value::Array(items)
                },
                other => normalize(&nested.block, other),
            }
        } else {
            v.clone()
        };
        out.insert(name.clone(), normalized);
    }
    for name in block.attributes.keys().chain(block.blocks.keys()) {
        out.entry(name.clone()).or_insert(Value::Null);
    }
    Value::Object(out)
}

fn normalize_attribute(attr_type: &AttributeType, value: &Value) -> Value {
    match (attr_type, value) {
        (AttributeType::Set(_), Value::Array(items)) => {
            let mut items = items.clone();
            sort_values(&mut items);
            Value::Array(items)
        },
        _ => value.clone(),
    }
}

fn sort_values(items: &mut [Value]) {
    items.sort_by_cached_key(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
}

fn apply_defaults(block: &Block, value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            let unset = obj.get(name).map_or(true, Value::is_null);
            if unset {
                obj.insert(name.clone(), default.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        match obj.get_mut(name) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    apply_defaults(&nested.block, item);
                }
            },
            Some(item @ Value::Object(_)) => apply_defaults(&nested.block, item),
            _ => {},
        }
    }
}

fn carry_computed(block: &Block, prior: Option<&Value>, planned: &mut Value) {
    let Some(obj) = planned.as_object_mut() else {
        return;
    };

    for (name, attr) in &block.attributes {
        if !attr.flags.computed || attr.flags.optional || attr.flags.required {
            continue;
        }
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        match prior_value {
            Some(v) => {
                obj.insert(name.clone(), v.clone());
            },
            None if name == "id" => {
                if let Some(key) = obj.get("key").filter(|k| k.is_string()).cloned() {
                    obj.insert(name.clone(), key);
                }
            },
            None => {},
        }
    }
}
