//! Plan computation
//!
//! Given the prior state and the user's configuration, compute the planned
//! state, the per-attribute changes, and whether the resource can be updated
//! in place or must be replaced. Resources refine the result through
//! [`ResourceDiff`] in their `customize_diff` hook.

use crate::codec::values_equal;
use crate::diagnostics::Diagnostics;
use crate::schema::{Attribute, Schema};
use crate::value::{AttrPath, Block, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    NoOp,
    Create,
    Update,
    Replace,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeChange {
    pub path: AttrPath,
    pub old: Value,
    pub new: Value,
    pub requires_replace: bool,
    pub sensitive: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Plan {
    pub action: PlanAction,
    pub planned: Block,
    pub changes: Vec<AttributeChange>,
    pub diagnostics: Diagnostics,
}

impl Plan {
    pub fn change(&self, name: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.path.attribute() == name)
    }

    pub fn requires_replace(&self) -> bool {
        self.action == PlanAction::Replace
    }
}

/// Plan without any resource-specific refinement.
pub fn plan(schema: &Schema, prior: Option<&Block>, config: &Block) -> Plan {
    ResourceDiff::new(schema, prior, config).finish()
}

const SENSITIVE: &str = "(sensitive value)";

/// Planned values of one block
fn plan_block(schema: &Schema, prior: Option<&Block>, config: &Block) -> Block {
    let mut planned = Block::new();
    match prior.and_then(|p| p.get("id")) {
        Some(id) => planned.insert("id", id.clone()),
        None if config.contains("id") => planned.insert("id", config.value("id").clone()),
        None => {}
    }
    for (name, attr) in schema.iter() {
        let prior_value = prior.map(|p| p.value(name));
        let value = plan_attribute(name, attr, prior_value, config.value(name));
        if !value.is_null() {
            planned.insert(name.clone(), value);
        }
    }
    planned
}

fn plan_attribute(name: &str, attr: &Attribute, prior: Option<&Value>, config: &Value) -> Value {
    let known_prior = prior.filter(|v| !v.is_null());

    if attr.is_computed_only() {
        return match prior {
            Some(v) => v.clone(),
            None => Value::Unknown,
        };
    }

    if !config.is_null() {
        if let Some(old) = known_prior {
            if attr.diff_suppress.map(|f| f(name, old, config)).unwrap_or(false)
                || (!config.is_unknown() && values_equal(&attr.ty, old, config) && attr.ty.object_schema().is_none())
            {
                return old.clone();
            }
        }
        return merge_nested(attr, known_prior, config);
    }

    if let Some(default) = &attr.default {
        return match known_prior {
            Some(old) if values_equal(&attr.ty, old, default) => old.clone(),
            _ => default.clone(),
        };
    }

    if attr.computed {
        return match prior {
            Some(v) => v.clone(),
            None => Value::Unknown,
        };
    }

    Value::Null
}

/// Plan the elements of a list or set of blocks, carrying computed
/// sub-attributes from the prior element at the same position.
fn merge_nested(attr: &Attribute, prior: Option<&Value>, config: &Value) -> Value {
    let (Some(nested), Some(items)) = (attr.ty.object_schema(), config.as_items()) else {
        return config.clone();
    };

    if attr.ty.is_set() {
        if let Some(old) = prior {
            if values_equal(&attr.ty, old, config) {
                return old.clone();
            }
        }
    }

    let prior_items = prior.and_then(Value::as_items).unwrap_or(&[]);
    let planned: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item.as_block() {
            Some(block) => {
                let prior_block = if attr.ty.is_set() {
                    None
                } else {
                    prior_items.get(i).and_then(Value::as_block)
                };
                Value::Block(plan_block(nested, prior_block, block))
            }
            None => item.clone(),
        })
        .collect();

    if attr.ty.is_set() {
        Value::Set(planned)
    } else {
        Value::List(planned)
    }
}

/// Whether a force-new field inside nested blocks differs.
fn nested_force_new_changed(attr: &Attribute, old: &Value, new: &Value) -> bool {
    let Some(nested) = attr.ty.object_schema() else {
        return false;
    };
    let forcing: Vec<(&String, &Attribute)> = nested.iter().filter(|(_, a)| a.force_new).collect();
    if forcing.is_empty() {
        return false;
    }
    let old_items = old.as_items().unwrap_or(&[]);
    let new_items = new.as_items().unwrap_or(&[]);
    if old_items.len() != new_items.len() {
        return true;
    }
    old_items.iter().zip(new_items).any(|(o, n)| {
        let (ob, nb) = (o.as_block(), n.as_block());
        forcing.iter().any(|(name, a)| {
            let ov = ob.map(|b| b.value(name)).unwrap_or(&Value::Null);
            let nv = nb.map(|b| b.value(name)).unwrap_or(&Value::Null);
            !nv.is_unknown() && !values_equal(&a.ty, ov, nv)
        })
    })
}

/// A plan under construction, handed to `customize_diff` hooks.
pub struct ResourceDiff<'a> {
    schema: &'a Schema,
    prior: Option<&'a Block>,
    raw_config: &'a Block,
    planned: Block,
    forced: BTreeSet<String>,
    overrides: BTreeMap<AttrPath, Value>,
    diagnostics: Diagnostics,
}

impl<'a> ResourceDiff<'a> {
    pub fn new(schema: &'a Schema, prior: Option<&'a Block>, raw_config: &'a Block) -> Self {
        let mut planned = plan_block(schema, prior, raw_config);
        if prior.is_none() {
            planned.insert("id", Value::Unknown);
        }
        Self {
            schema,
            prior,
            raw_config,
            planned,
            forced: BTreeSet::new(),
            overrides: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.prior.and_then(|p| p.value("id").as_str())
    }

    pub fn is_new_resource(&self) -> bool {
        self.prior.is_none()
    }

    /// Planned value
    pub fn get(&self, key: &str) -> &Value {
        self.planned
            .get_path(&AttrPath::parse(key))
            .unwrap_or(&Value::Null)
    }

    /// Prior value
    pub fn get_old(&self, key: &str) -> &Value {
        self.prior
            .and_then(|p| p.get_path(&AttrPath::parse(key)))
            .unwrap_or(&Value::Null)
    }

    pub fn get_change(&self, key: &str) -> (&Value, &Value) {
        (self.get_old(key), self.get(key))
    }

    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        if self.prior.is_none() {
            return !new.is_null();
        }
        if new.is_unknown() {
            return !old.is_unknown();
        }
        match self.schema.lookup(&AttrPath::parse(key)) {
            Some(attr) => !values_equal(&attr.ty, old, new),
            None => old != new,
        }
    }

    pub fn is_set_in_config(&self, key: &str) -> bool {
        self.raw_config
            .get_path(&AttrPath::parse(key))
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    /// Require replacement because of a change to `key`.
    pub fn force_new(&mut self, key: &str) {
        self.forced.insert(AttrPath::parse(key).attribute().to_string());
    }

    /// Mark `key` as known only after apply.
    pub fn set_new_computed(&mut self, key: &str) {
        self.set_new(key, Value::Unknown);
    }

    pub fn set_new(&mut self, key: &str, value: impl Into<Value>) {
        let path = AttrPath::parse(key);
        let value = value.into();
        self.planned.set_path(&path, value.clone());
        self.overrides.insert(path, value);
    }

    /// Discard the planned change to `key`.
    pub fn clear(&mut self, key: &str) {
        let old = self.get_old(key).clone();
        self.set_new(key, old);
    }

    pub fn warn(&mut self, summary: impl Into<String>, path: &str) {
        self.diagnostics.warn(summary, path);
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn finish(self) -> Plan {
        let empty = Block::new();
        let prior = self.prior;
        let old_block = prior.unwrap_or(&empty);

        let mut changes = Vec::new();
        for (name, attr) in self.schema.iter() {
            if name == "timeouts" {
                continue;
            }
            let old = old_block.value(name);
            let new = self.planned.value(name);
            let changed = match prior {
                None => !new.is_null(),
                Some(_) if new.is_unknown() => !old.is_unknown(),
                Some(_) => !values_equal(&attr.ty, old, new),
            };
            if !changed {
                continue;
            }
            let requires_replace = prior.is_some()
                && (attr.force_new
                    || self.forced.contains(name.as_str())
                    || nested_force_new_changed(attr, old, new));
            changes.push(AttributeChange {
                path: AttrPath::root(name),
                old: mask(attr, old),
                new: mask(attr, new),
                requires_replace,
                sensitive: attr.sensitive,
            });
        }

        let action = match prior {
            None => PlanAction::Create,
            Some(_) if changes.iter().any(|c| c.requires_replace) => PlanAction::Replace,
            Some(_) if !changes.is_empty() => PlanAction::Update,
            Some(_) => PlanAction::NoOp,
        };

        let planned = if action == PlanAction::Replace {
            let mut fresh = plan_block(self.schema, None, self.raw_config);
            fresh.insert("id", Value::Unknown);
            for (path, value) in self.overrides {
                fresh.set_path(&path, value);
            }
            fresh
        } else {
            self.planned
        };

        Plan {
            action,
            planned,
            changes,
            diagnostics: self.diagnostics,
        }
    }
}

fn mask(attr: &Attribute, value: &Value) -> Value {
    if attr.sensitive && !value.is_null() && !value.is_unknown() {
        Value::String(SENSITIVE.to_string())
    } else {
        value.clone()
    }
}
