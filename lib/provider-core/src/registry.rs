//! Resource registry
//!
//! Holds the resource and data-source types a provider exposes, and drives
//! their hooks for the host: validation and planning, apply (create,
//! update, replace, delete), refresh, import and data-source reads. Error
//! policies shared by every resource live here, so bindings only implement
//! the vendor calls.

use crate::codec::retain_sensitive;
use crate::config::{parse_duration, EngineConfig, Operation, Timeouts};
use crate::data::ResourceData;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::diff::{Plan, PlanAction, ResourceDiff};
use crate::resource::{DataSource, HookContext, Resource};
use crate::schema::{AttrType, Schema};
use crate::value::{Block, Value};
use crate::{ErrorClass, ProviderError, Result};
use serde::Serialize;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct RegisteredResource {
    resource: Arc<dyn Resource>,
    schema: Arc<Schema>,
}

struct RegisteredDataSource {
    source: Arc<dyn DataSource>,
    schema: Arc<Schema>,
}

/// Outcome of a hook: the new state (`None` when the resource is gone) and
/// the diagnostics to show.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ApplyResult {
    pub state: Option<Block>,
    pub diagnostics: Diagnostics,
}

impl ApplyResult {
    fn ok(state: Option<Block>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    fn failed(state: Option<Block>, mut diagnostics: Diagnostics, err: &ProviderError) -> Self {
        diagnostics.error(err);
        Self { state, diagnostics }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// What the host asks `apply` to do. The action follows from which sides
/// are present: no planned state deletes, no prior state creates, a planned
/// state whose id is unknown replaces, anything else updates.
#[derive(Clone, Debug, Default)]
pub struct ApplyRequest {
    pub prior: Option<Block>,
    pub planned: Option<Block>,
    pub config: Block,
}

/// Registry of resource and data-source types
pub struct ResourceRegistry {
    config: Arc<EngineConfig>,
    resources: BTreeMap<&'static str, RegisteredResource>,
    data_sources: BTreeMap<&'static str, RegisteredDataSource>,
}

impl ResourceRegistry {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    /// Register a resource type. Its schema is built once and checked for
    /// descriptor mistakes.
    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) -> Result<()> {
        let name = resource.type_name();
        let schema = resource.schema();
        check_descriptors(name, &schema)?;
        debug!(resource = name, attributes = schema.len(), "Registered resource");
        self.resources.insert(
            name,
            RegisteredResource {
                resource,
                schema: Arc::new(schema),
            },
        );
        Ok(())
    }

    pub fn register_data_source(&mut self, source: Arc<dyn DataSource>) -> Result<()> {
        let name = source.type_name();
        let schema = source.schema();
        check_descriptors(name, &schema)?;
        debug!(data_source = name, attributes = schema.len(), "Registered data source");
        self.data_sources.insert(
            name,
            RegisteredDataSource {
                source,
                schema: Arc::new(schema),
            },
        );
        Ok(())
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    pub fn resource_schema(&self, type_name: &str) -> Result<Arc<Schema>> {
        Ok(self.resource(type_name)?.schema.clone())
    }

    pub fn data_source_schema(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.data_sources
            .get(type_name)
            .map(|d| d.schema.clone())
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    /// Describe every registered schema for the host.
    pub fn describe(&self) -> Json {
        let resources: serde_json::Map<String, Json> = self
            .resources
            .iter()
            .map(|(name, r)| (name.to_string(), describe_schema(&r.schema)))
            .collect();
        let data_sources: serde_json::Map<String, Json> = self
            .data_sources
            .iter()
            .map(|(name, d)| (name.to_string(), describe_schema(&d.schema)))
            .collect();
        json!({ "resources": resources, "data_sources": data_sources })
    }

    pub fn validate(&self, type_name: &str, config: &Block) -> Result<Diagnostics> {
        Ok(self.resource(type_name)?.schema.validate_config(config))
    }

    /// Compute the plan for one resource instance.
    pub async fn plan(
        &self,
        type_name: &str,
        prior: Option<&Block>,
        config: &Block,
        cancel: CancellationToken,
    ) -> Result<Plan> {
        let entry = self.resource(type_name)?;
        let diagnostics = entry.schema.validate_config(config);
        if diagnostics.has_errors() {
            return Ok(rejected_plan(prior, diagnostics));
        }

        let timeouts = self.timeouts(entry.resource.as_ref(), Some(config), prior)?;
        let ctx = self.context(Operation::Read, &timeouts, cancel);
        let mut diff = ResourceDiff::new(&entry.schema, prior, config);
        if let Err(err) = entry.resource.customize_diff(&ctx, &mut diff).await {
            let mut diagnostics = diagnostics;
            diagnostics.extend(std::mem::take(diff.diagnostics_mut()));
            diagnostics.error(&err);
            return Ok(rejected_plan(prior, diagnostics));
        }

        let mut plan = diff.finish();
        let mut all = diagnostics;
        all.extend(std::mem::take(&mut plan.diagnostics));
        plan.diagnostics = all;

        debug!(
            resource = type_name,
            action = ?plan.action,
            changes = plan.changes.len(),
            "Planned"
        );
        Ok(plan)
    }

    /// Apply a planned change.
    pub async fn apply(&self, type_name: &str, request: ApplyRequest, cancel: CancellationToken) -> Result<ApplyResult> {
        let entry = self.resource(type_name)?;
        let ApplyRequest { prior, planned, config } = request;

        let result = match (prior, planned) {
            (None, None) => ApplyResult::default(),
            (Some(prior), None) => self.delete(entry, type_name, prior, &config, cancel).await?,
            (None, Some(planned)) => self.create(entry, type_name, planned, config, cancel).await?,
            (Some(prior), Some(planned)) if planned.value("id").is_unknown() => {
                info!(resource = type_name, id = %prior.value("id"), "Replacing resource");
                let deleted = self.delete(entry, type_name, prior, &config, cancel.clone()).await?;
                if deleted.has_errors() {
                    return Ok(deleted);
                }
                let mut created = self.create(entry, type_name, planned, config, cancel).await?;
                let mut diagnostics = deleted.diagnostics;
                diagnostics.extend(created.diagnostics);
                created.diagnostics = diagnostics;
                created
            }
            (Some(prior), Some(planned)) => self.update(entry, type_name, prior, planned, config, cancel).await?,
        };
        Ok(result)
    }

    /// Refresh a stored state from the vendor.
    pub async fn read(&self, type_name: &str, state: Block, cancel: CancellationToken) -> Result<ApplyResult> {
        let entry = self.resource(type_name)?;
        let timeouts = self.timeouts(entry.resource.as_ref(), None, Some(&state))?;
        let ctx = self.context(Operation::Read, &timeouts, cancel);
        let mut data = ResourceData::from_state(entry.schema.clone(), state.clone());
        info!(resource = type_name, id = %state.value("id"), "Reading resource");

        match entry.resource.read(&ctx, &mut data).await {
            Ok(()) => {
                let diagnostics = data.take_diagnostics();
                let next = data.into_state().map(|mut next| {
                    retain_sensitive(&entry.schema, &state, &mut next);
                    keep_timeouts(&state, &mut next);
                    resolve_unknowns(next)
                });
                if next.is_none() {
                    info!(resource = type_name, id = %state.value("id"), "Resource is gone, removing from state");
                }
                self.log_state(type_name, &entry.schema, next.as_ref());
                Ok(ApplyResult::ok(next, diagnostics))
            }
            Err(err) if err.is_not_found() => {
                info!(resource = type_name, id = %state.value("id"), "Resource is gone, removing from state");
                Ok(ApplyResult::ok(None, data.take_diagnostics()))
            }
            Err(err) => {
                warn!(resource = type_name, error = %err, "Read failed");
                Ok(ApplyResult::failed(Some(state), data.take_diagnostics(), &err))
            }
        }
    }

    /// Adopt an existing vendor resource by its scoped id.
    pub async fn import(&self, type_name: &str, id: &str, cancel: CancellationToken) -> Result<ApplyResult> {
        let entry = self.resource(type_name)?;
        let timeouts = self.timeouts(entry.resource.as_ref(), None, None)?;
        let ctx = self.context(Operation::Read, &timeouts, cancel);
        let mut data = ResourceData::for_import(entry.schema.clone(), id);
        info!(resource = type_name, id, "Importing resource");

        match entry.resource.import(&ctx, &mut data).await {
            Ok(()) => {
                let diagnostics = data.take_diagnostics();
                match data.into_state() {
                    Some(state) => Ok(ApplyResult::ok(Some(resolve_unknowns(state)), diagnostics)),
                    None => {
                        let err = ProviderError::NotFoundByName {
                            kind: type_name.to_string(),
                            name: id.to_string(),
                        };
                        Ok(ApplyResult::failed(None, diagnostics, &err))
                    }
                }
            }
            Err(err) => Ok(ApplyResult::failed(None, data.take_diagnostics(), &err)),
        }
    }

    /// Run a data-source lookup.
    pub async fn read_data_source(&self, type_name: &str, config: Block, cancel: CancellationToken) -> Result<ApplyResult> {
        let entry = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))?;

        let diagnostics = entry.schema.validate_config(&config);
        if diagnostics.has_errors() {
            return Ok(ApplyResult::ok(None, diagnostics));
        }

        let ctx = self.context(Operation::Read, &Timeouts::default(), cancel);
        let mut data = ResourceData::for_create(entry.schema.clone(), config.clone(), config);
        debug!(data_source = type_name, "Reading data source");

        match entry.source.read(&ctx, &mut data).await {
            Ok(()) => {
                let mut all = diagnostics;
                all.extend(data.take_diagnostics());
                let state = data.into_state().map(resolve_unknowns);
                self.log_state(type_name, &entry.schema, state.as_ref());
                Ok(ApplyResult::ok(state, all))
            }
            Err(err) => Ok(ApplyResult::failed(None, data.take_diagnostics(), &err)),
        }
    }

    async fn create(
        &self,
        entry: &RegisteredResource,
        type_name: &str,
        planned: Block,
        config: Block,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        let timeouts = self.timeouts(entry.resource.as_ref(), Some(&config), None)?;
        let ctx = self.context(Operation::Create, &timeouts, cancel.clone());
        let mut data = ResourceData::for_create(entry.schema.clone(), planned, config);
        info!(resource = type_name, "Creating resource");

        match entry.resource.create(&ctx, &mut data).await {
            Ok(()) => {
                let diagnostics = data.take_diagnostics();
                let state = data.into_state().map(resolve_unknowns);
                info!(resource = type_name, id = ?state.as_ref().map(|s| s.value("id").to_string()), "Created resource");
                self.log_state(type_name, &entry.schema, state.as_ref());
                Ok(ApplyResult::ok(state, diagnostics))
            }
            Err(err) if data.is_partial() || matches!(err.class(), ErrorClass::Timeout | ErrorClass::Cancelled) => {
                warn!(resource = type_name, id = ?data.id(), error = %err, "Create failed after the resource was created, keeping it in state");
                let diagnostics = data.take_diagnostics();
                Ok(ApplyResult::failed(data.into_state().map(resolve_unknowns), diagnostics, &err))
            }
            Err(err) => {
                let diagnostics = data.take_diagnostics();
                if let Some(id) = data.id().map(str::to_string) {
                    warn!(resource = type_name, id = %id, error = %err, "Create failed, deleting the new resource");
                    let state = data.state().clone().with("id", id.as_str());
                    let ctx = self.context(Operation::Delete, &timeouts, cancel);
                    let mut cleanup = ResourceData::from_state(entry.schema.clone(), state.clone());
                    if let Err(cleanup_err) = entry.resource.delete(&ctx, &mut cleanup).await {
                        if !cleanup_err.is_not_found() {
                            warn!(resource = type_name, id = %id, error = %cleanup_err, "Cleanup after failed create failed");
                            return Ok(ApplyResult::failed(Some(resolve_unknowns(state)), diagnostics, &err));
                        }
                    }
                }
                Ok(ApplyResult::failed(None, diagnostics, &err))
            }
        }
    }

    async fn update(
        &self,
        entry: &RegisteredResource,
        type_name: &str,
        prior: Block,
        planned: Block,
        config: Block,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        let timeouts = self.timeouts(entry.resource.as_ref(), Some(&config), Some(&prior))?;
        let ctx = self.context(Operation::Update, &timeouts, cancel);
        let mut data = ResourceData::for_update(entry.schema.clone(), prior.clone(), planned, config);
        info!(resource = type_name, id = %prior.value("id"), "Updating resource");

        match entry.resource.update(&ctx, &mut data).await {
            Ok(()) => {
                let diagnostics = data.take_diagnostics();
                let state = data.into_state().map(|mut next| {
                    retain_sensitive(&entry.schema, &prior, &mut next);
                    resolve_unknowns(next)
                });
                self.log_state(type_name, &entry.schema, state.as_ref());
                Ok(ApplyResult::ok(state, diagnostics))
            }
            Err(err) => {
                warn!(resource = type_name, id = %prior.value("id"), error = %err, "Update failed");
                Ok(ApplyResult::failed(Some(prior), data.take_diagnostics(), &err))
            }
        }
    }

    async fn delete(
        &self,
        entry: &RegisteredResource,
        type_name: &str,
        prior: Block,
        config: &Block,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        let timeouts = self.timeouts(entry.resource.as_ref(), Some(config), Some(&prior))?;
        let ctx = self.context(Operation::Delete, &timeouts, cancel);
        let mut data = ResourceData::from_state(entry.schema.clone(), prior.clone());
        info!(resource = type_name, id = %prior.value("id"), "Deleting resource");

        match entry.resource.delete(&ctx, &mut data).await {
            Ok(()) => Ok(ApplyResult::ok(None, data.take_diagnostics())),
            Err(err) if err.is_not_found() => {
                debug!(resource = type_name, id = %prior.value("id"), "Resource already gone");
                Ok(ApplyResult::ok(None, data.take_diagnostics()))
            }
            Err(err) => {
                warn!(resource = type_name, id = %prior.value("id"), error = %err, "Delete failed");
                Ok(ApplyResult::failed(Some(prior), data.take_diagnostics(), &err))
            }
        }
    }

    fn resource(&self, type_name: &str) -> Result<&RegisteredResource> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    fn context(&self, op: Operation, timeouts: &Timeouts, cancel: CancellationToken) -> HookContext {
        HookContext::new(self.config.clone(), op, timeouts.for_operation(op), cancel)
    }

    /// Resource defaults overridden by a `timeouts` block in configuration,
    /// else in the stored state.
    fn timeouts(&self, resource: &dyn Resource, config: Option<&Block>, state: Option<&Block>) -> Result<Timeouts> {
        let mut timeouts = resource.timeouts();
        let block = [config, state]
            .into_iter()
            .flatten()
            .find_map(|b| crate::codec::expand_single_block(b.value("timeouts")));
        if let Some(block) = block {
            for op in [Operation::Create, Operation::Read, Operation::Update, Operation::Delete] {
                if let Some(raw) = block.value(op.as_str()).as_str().filter(|s| !s.is_empty()) {
                    let duration = parse_duration(raw)
                        .map_err(|_| ProviderError::invalid_attribute(format!("timeouts.0.{}", op.as_str()), raw))?;
                    timeouts.set(op, duration);
                }
            }
        }
        Ok(timeouts)
    }

    fn log_state(&self, type_name: &str, schema: &Schema, state: Option<&Block>) {
        if let Some(state) = state {
            debug!(resource = type_name, state = %schema.mask(state).to_json(), "State");
        }
    }
}

fn check_descriptors(name: &str, schema: &Schema) -> Result<()> {
    let problems = schema.descriptor_problems();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Internal(format!("{}: {}", name, problems.join("; "))))
    }
}

fn rejected_plan(prior: Option<&Block>, diagnostics: Diagnostics) -> Plan {
    Plan {
        action: PlanAction::NoOp,
        planned: prior.cloned().unwrap_or_default(),
        changes: Vec::new(),
        diagnostics,
    }
}

/// Keep the `timeouts` block the user configured across refreshes.
fn keep_timeouts(prior: &Block, next: &mut Block) {
    if let Some(timeouts) = prior.get("timeouts") {
        if !next.contains("timeouts") {
            next.insert("timeouts", timeouts.clone());
        }
    }
}

/// After apply nothing is "known after apply" any more: leftovers become null.
fn resolve_unknowns(block: Block) -> Block {
    block
        .iter()
        .filter_map(|(k, v)| resolve_value(v.clone()).map(|v| (k.clone(), v)))
        .collect()
}

fn resolve_value(value: Value) -> Option<Value> {
    match value {
        Value::Unknown | Value::Null => None,
        Value::List(items) => Some(Value::List(items.into_iter().filter_map(resolve_value).collect())),
        Value::Set(items) => Some(Value::Set(items.into_iter().filter_map(resolve_value).collect())),
        Value::Block(block) => Some(Value::Block(resolve_unknowns(block))),
        other => Some(other),
    }
}

fn describe_schema(schema: &Schema) -> Json {
    let attributes: serde_json::Map<String, Json> = schema
        .iter()
        .map(|(name, attr)| {
            let mut entry = json!({
                "type": attr.ty.to_string(),
                "required": attr.required,
                "optional": attr.optional,
                "computed": attr.computed,
                "force_new": attr.force_new,
                "sensitive": attr.sensitive,
            });
            if !attr.description.is_empty() {
                entry["description"] = json!(attr.description);
            }
            if let Some(max) = attr.max_items {
                entry["max_items"] = json!(max);
            }
            if let Some(default) = &attr.default {
                entry["default"] = default.to_json();
            }
            if let Some(message) = attr.deprecated {
                entry["deprecated"] = json!(message);
            }
            if let AttrType::List(inner) | AttrType::Set(inner) = &attr.ty {
                if let AttrType::Object(nested) = &**inner {
                    entry["block"] = describe_schema(nested);
                }
            }
            (name.clone(), entry)
        })
        .collect();
    json!({ "attributes": attributes })
}

impl From<ProviderError> for ApplyResult {
    fn from(err: ProviderError) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::from(&err));
        ApplyResult::ok(None, diagnostics)
    }
}
