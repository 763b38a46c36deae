//! Conversions between the host attribute tree and typed vendor DTOs

use crate::schema::{AttrType, Schema};
use crate::value::{Block, Value};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A field of an update request.
///
/// `Unchanged` is omitted from the request body, `Cleared` is sent as the
/// type's empty value, `Set` is sent as-is. Pair with
/// `#[serde(default, skip_serializing_if = "Updated::is_unchanged")]`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Updated<T> {
    #[default]
    Unchanged,
    Cleared,
    Set(T),
}

impl<T> Updated<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Updated::Unchanged)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Updated<U> {
        match self {
            Updated::Unchanged => Updated::Unchanged,
            Updated::Cleared => Updated::Cleared,
            Updated::Set(value) => Updated::Set(f(value)),
        }
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Updated::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Serialize + Default> Serialize for Updated<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Updated::Unchanged => serializer.serialize_none(),
            Updated::Cleared => T::default().serialize(serializer),
            Updated::Set(value) => value.serialize(serializer),
        }
    }
}

/// Non-empty string, or `None`
pub fn expand_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// String elements of a list or set, in order
pub fn expand_strings(value: &Value) -> Vec<String> {
    value
        .as_items()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// String elements of a set, sorted and deduplicated
pub fn expand_string_set(value: &Value) -> Vec<String> {
    let mut items = expand_strings(value);
    items.sort();
    items.dedup();
    items
}

pub fn expand_string_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_map()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// The single block of a `max_items = 1` list attribute
pub fn expand_single_block(value: &Value) -> Option<&Block> {
    value.as_items()?.first()?.as_block()
}

/// Every block of a list or set of blocks
pub fn expand_blocks(value: &Value) -> Vec<&Block> {
    value
        .as_items()
        .map(|items| items.iter().filter_map(Value::as_block).collect())
        .unwrap_or_default()
}

pub fn flatten_strings(items: &[String]) -> Value {
    Value::List(items.iter().cloned().map(Value::String).collect())
}

pub fn flatten_string_set(items: &[String]) -> Value {
    let mut sorted = items.to_vec();
    sorted.sort();
    Value::Set(sorted.into_iter().map(Value::String).collect())
}

pub fn flatten_string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Wrap a block as the one-element list the host expects
pub fn flatten_single_block(block: Block) -> Value {
    Value::List(vec![Value::Block(block)])
}

pub fn flatten_time(time: Option<&DateTime<Utc>>) -> Value {
    time.map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(Value::Null)
}

/// Stable fingerprint of a value, used to compare set elements.
pub fn fingerprint(value: &Value) -> String {
    let canonical = serde_json::to_vec(&value.to_json()).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Multiset equality of two element lists
pub fn sets_equal(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<String> = a.iter().map(fingerprint).collect();
    let mut right: Vec<String> = b.iter().map(fingerprint).collect();
    left.sort();
    right.sort();
    left == right
}

/// Type-aware equality: sets ignore order, nested blocks recurse.
pub fn values_equal(ty: &AttrType, a: &Value, b: &Value) -> bool {
    match (ty, a, b) {
        (_, Value::Null, other) | (_, other, Value::Null) if other.is_zero() => true,
        (AttrType::Set(elem), _, _) => match (a.as_items(), b.as_items()) {
            (Some(x), Some(y)) => match elem.as_ref() {
                AttrType::Object(schema) => {
                    let project = |items: &[Value]| -> Vec<Value> {
                        items.iter().map(|v| project_configurable(schema, v)).collect()
                    };
                    sets_equal(&project(x), &project(y))
                }
                _ => sets_equal(x, y),
            },
            _ => a == b,
        },
        (AttrType::List(elem), _, _) => match (a.as_items(), b.as_items()) {
            (Some(x), Some(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(elem, l, r))
            }
            _ => a == b,
        },
        (AttrType::Object(schema), Value::Block(x), Value::Block(y)) => {
            schema.iter().all(|(name, attr)| {
                values_equal(&attr.ty, x.value(name), y.value(name))
            })
        }
        (AttrType::Int | AttrType::Float, _, _) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Strip computed-only fields from a block element so set comparison only
/// looks at what the user can declare.
fn project_configurable(schema: &Schema, value: &Value) -> Value {
    match value.as_block() {
        Some(block) => Value::Block(
            block
                .iter()
                .filter(|(k, _)| schema.get(k).map(|a| !a.is_computed_only()).unwrap_or(true))
                .filter(|(_, v)| !v.is_zero())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        None => value.clone(),
    }
}

/// Sort set elements by fingerprint so equal sets produce equal lists.
pub fn normalize_set(items: &[Value]) -> Vec<Value> {
    let mut keyed: Vec<(String, Value)> = items.iter().map(|v| (fingerprint(v), v.clone())).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, v)| v).collect()
}

/// Keep sensitive values from `prior` when the vendor did not return them.
pub fn retain_sensitive(schema: &Schema, prior: &Block, next: &mut Block) {
    for (name, attr) in schema.iter() {
        if attr.sensitive {
            let prior_value = prior.value(name);
            if next.value(name).is_zero() && !prior_value.is_zero() {
                next.insert(name.clone(), prior_value.clone());
            }
            continue;
        }
        let Some(nested) = attr.ty.object_schema() else {
            continue;
        };
        let (Some(prior_items), Some(next_items)) = (prior.value(name).as_items(), next.value(name).as_items()) else {
            continue;
        };
        let merged: Vec<Value> = next_items
            .iter()
            .enumerate()
            .map(|(i, item)| match (item.as_block(), prior_items.get(i).and_then(Value::as_block)) {
                (Some(next_block), Some(prior_block)) => {
                    let mut block = next_block.clone();
                    retain_sensitive(nested, prior_block, &mut block);
                    Value::Block(block)
                }
                _ => item.clone(),
            })
            .collect();
        let rebuilt = if attr.ty.is_set() {
            Value::Set(merged)
        } else {
            Value::List(merged)
        };
        next.insert(name.clone(), rebuilt);
    }
}
