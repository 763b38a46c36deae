//! Per-hook view of a resource
//!
//! [`ResourceData`] is what a lifecycle hook reads its inputs from and
//! writes its results to. It keeps the prior state, the planned values, and
//! the raw configuration apart so hooks can tell "unset" from "set to the
//! default" and "cleared" from "untouched".

use crate::codec::{values_equal, Updated};
use crate::diagnostics::Diagnostics;
use crate::schema::Schema;
use crate::value::{AttrPath, Block, Value};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ResourceData {
    schema: Arc<Schema>,
    id: Option<String>,
    prior: Block,
    planned: Block,
    raw_config: Block,
    state: Block,
    partial: bool,
    diagnostics: Diagnostics,
}

impl ResourceData {
    /// Inputs of a Create hook
    pub fn for_create(schema: Arc<Schema>, planned: Block, raw_config: Block) -> Self {
        Self {
            schema,
            id: None,
            prior: Block::new(),
            state: planned.clone(),
            planned,
            raw_config,
            partial: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Inputs of an Update hook
    pub fn for_update(schema: Arc<Schema>, prior: Block, planned: Block, raw_config: Block) -> Self {
        let id = prior.value("id").as_str().map(str::to_string);
        Self {
            schema,
            id,
            state: planned.clone(),
            prior,
            planned,
            raw_config,
            partial: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Inputs of Read and Delete hooks: the stored state only
    pub fn from_state(schema: Arc<Schema>, state: Block) -> Self {
        let id = state.value("id").as_str().map(str::to_string);
        Self {
            schema,
            id,
            prior: state.clone(),
            planned: state.clone(),
            raw_config: Block::new(),
            state,
            partial: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Inputs of an Import hook: just the identifier
    pub fn for_import(schema: Arc<Schema>, id: &str) -> Self {
        let state = Block::new().with("id", id);
        let mut data = Self::from_state(schema, state);
        data.id = Some(id.to_string());
        data
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.state.insert("id", id.clone());
        self.id = Some(id);
    }

    /// Drop the resource from state; used when Read finds it gone.
    pub fn clear_id(&mut self) {
        self.id = None;
        self.state.remove("id");
    }

    /// Current value: what the hook has set, else the planned value.
    pub fn get(&self, key: &str) -> &Value {
        self.lookup(&self.state, key)
    }

    /// Current value when it is not the zero value of its type.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        let value = self.get(key);
        (!value.is_zero() && !value.is_unknown()).then_some(value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).as_int()
    }

    /// Prior and planned values
    pub fn get_change(&self, key: &str) -> (&Value, &Value) {
        (self.lookup(&self.prior, key), self.lookup(&self.planned, key))
    }

    /// Whether the plan changes `key`, with set and nested-block semantics.
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        if new.is_unknown() {
            return !old.is_unknown();
        }
        match self.schema.lookup(&AttrPath::parse(key)) {
            Some(attr) => !values_equal(&attr.ty, old, new),
            None => old != new,
        }
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// Whether the user wrote `key` in configuration, even with the
    /// attribute's default value.
    pub fn is_set_in_config(&self, key: &str) -> bool {
        self.raw_config
            .get_path(&AttrPath::parse(key))
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    pub fn raw_config(&self) -> &Block {
        &self.raw_config
    }

    pub fn prior(&self) -> &Block {
        &self.prior
    }

    /// Tri-state patch value for `key`.
    pub fn get_updated<T>(&self, key: &str, expand: impl FnOnce(&Value) -> T) -> Updated<T> {
        if !self.has_change(key) {
            return Updated::Unchanged;
        }
        let (_, new) = self.get_change(key);
        if new.is_zero() {
            Updated::Cleared
        } else {
            Updated::Set(expand(new))
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let path = AttrPath::parse(key);
        self.state.set_path(&path, value.into());
    }

    /// Mark a multi-phase create as past its first phase: a later failure
    /// keeps the resource in state instead of rolling it back.
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn warn(&mut self, summary: impl Into<String>, path: &str) {
        self.diagnostics.warn(summary, path);
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Resulting state, or `None` when the resource no longer exists.
    pub fn into_state(self) -> Option<Block> {
        let id = self.id?;
        let mut state = self.state;
        state.insert("id", id);
        Some(state)
    }

    pub fn state(&self) -> &Block {
        &self.state
    }

    fn lookup<'a>(&self, block: &'a Block, key: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        block.get_path(&AttrPath::parse(key)).unwrap_or(&NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrType, Attribute};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .attr("name", Attribute::required(AttrType::String))
                .attr("tags", Attribute::optional(AttrType::list(AttrType::String)))
                .attr("feature_gates", Attribute::optional(AttrType::set(AttrType::String)))
                .attr("description", Attribute::optional(AttrType::String)),
        )
    }

    #[test]
    fn test_change_detection_and_tri_state() {
        let prior = Block::new()
            .with("id", "fr-par/x")
            .with("name", "a")
            .with("tags", Value::List(vec!["t1".into()]))
            .with("feature_gates", Value::Set(vec!["A".into(), "B".into()]));
        let planned = Block::new()
            .with("name", "b")
            .with("tags", Value::List(vec![]))
            .with("feature_gates", Value::Set(vec!["B".into(), "A".into()]));
        let data = ResourceData::for_update(schema(), prior, planned.clone(), planned);

        assert_eq!(data.id(), Some("fr-par/x"));
        assert!(data.has_change("name"));
        assert!(data.has_change("tags"));
        assert!(!data.has_change("feature_gates"));
        assert!(!data.has_change("description"));

        assert_eq!(data.get_updated("name", |v| v.as_str().unwrap().to_string()), Updated::Set("b".to_string()));
        assert_eq!(data.get_updated("tags", crate::codec::expand_strings), Updated::Cleared);
        assert_eq!(data.get_updated("description", crate::codec::expand_strings), Updated::Unchanged);
    }

    #[test]
    fn test_raw_config_distinguishes_default() {
        let planned = Block::new().with("name", "a").with("description", "");
        let raw = Block::new().with("name", "a");
        let data = ResourceData::for_create(schema(), planned, raw);
        assert!(data.is_set_in_config("name"));
        assert!(!data.is_set_in_config("description"));
        assert!(data.get_ok("description").is_none());
    }

    #[test]
    fn test_clear_id_drops_state() {
        let mut data = ResourceData::from_state(schema(), Block::new().with("id", "fr-par/x").with("name", "a"));
        data.set("name", "b");
        assert_eq!(data.get("name"), &Value::from("b"));
        data.clear_id();
        assert!(data.into_state().is_none());
    }
}
