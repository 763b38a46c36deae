//! Attribute descriptors
//!
//! A [`Schema`] describes every attribute of a resource: its type, whether
//! the user must, may, or cannot set it, and how changes to it are planned.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::value::{AttrPath, Block, Value};
use crate::{ProviderError, Result};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

/// Checks a configured value, returning a message on failure.
pub type ValidateFn = fn(&Value) -> std::result::Result<(), String>;

/// Declares two values equal for planning purposes: `(key, old, new)`.
pub type DiffSuppressFn = fn(&str, &Value, &Value) -> bool;

#[derive(Clone, Debug)]
pub enum AttrType {
    Bool,
    Int,
    Float,
    String,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
    /// A nested block; only valid as a list or set element
    Object(Schema),
}

impl AttrType {
    pub fn list(elem: AttrType) -> Self {
        AttrType::List(Box::new(elem))
    }

    pub fn set(elem: AttrType) -> Self {
        AttrType::Set(Box::new(elem))
    }

    pub fn map(elem: AttrType) -> Self {
        AttrType::Map(Box::new(elem))
    }

    /// A list of nested blocks
    pub fn blocks(schema: Schema) -> Self {
        AttrType::List(Box::new(AttrType::Object(schema)))
    }

    /// A set of nested blocks
    pub fn block_set(schema: Schema) -> Self {
        AttrType::Set(Box::new(AttrType::Object(schema)))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, AttrType::Set(_))
    }

    /// Nested block schema for list/set-of-object attributes
    pub fn object_schema(&self) -> Option<&Schema> {
        match self {
            AttrType::List(elem) | AttrType::Set(elem) => match elem.as_ref() {
                AttrType::Object(schema) => Some(schema),
                _ => None,
            },
            AttrType::Object(schema) => Some(schema),
            _ => None,
        }
    }

    /// Decode untyped JSON into a [`Value`] of this type.
    pub fn decode(&self, path: &AttrPath, json: &Json) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        if Value::is_unknown_marker(json) {
            return Ok(Value::Unknown);
        }
        let mismatch = || ProviderError::invalid_attribute(path.to_string(), format!("expected {}, got {}", self, json));
        match self {
            AttrType::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            AttrType::Int => json.as_i64().map(Value::Int).ok_or_else(mismatch),
            AttrType::Float => json.as_f64().map(Value::Float).ok_or_else(mismatch),
            AttrType::String => match json {
                Json::String(s) => Ok(Value::String(s.clone())),
                Json::Number(n) => Ok(Value::String(n.to_string())),
                Json::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(mismatch()),
            },
            AttrType::List(elem) | AttrType::Set(elem) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                let decoded = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| elem.decode(&path.child(i), item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if self.is_set() {
                    Value::Set(decoded)
                } else {
                    Value::List(decoded)
                })
            }
            AttrType::Map(elem) => {
                let object = json.as_object().ok_or_else(mismatch)?;
                let mut map = BTreeMap::new();
                for (key, item) in object {
                    map.insert(key.clone(), elem.decode(&path.child(key), item)?);
                }
                Ok(Value::Map(map))
            }
            AttrType::Object(schema) => Ok(Value::Block(schema.decode_at(path, json)?)),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => f.write_str("bool"),
            AttrType::Int => f.write_str("number"),
            AttrType::Float => f.write_str("float"),
            AttrType::String => f.write_str("string"),
            AttrType::List(elem) => write!(f, "list({})", elem),
            AttrType::Set(elem) => write!(f, "set({})", elem),
            AttrType::Map(elem) => write!(f, "map({})", elem),
            AttrType::Object(_) => f.write_str("block"),
        }
    }
}

/// One attribute descriptor
#[derive(Clone)]
pub struct Attribute {
    pub ty: AttrType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub max_items: Option<usize>,
    pub validate: Option<ValidateFn>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub conflicts_with: Vec<&'static str>,
    pub deprecated: Option<&'static str>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .field("sensitive", &self.sensitive)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl Attribute {
    fn base(ty: AttrType) -> Self {
        Self {
            ty,
            description: "",
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            max_items: None,
            validate: None,
            diff_suppress: None,
            conflicts_with: Vec::new(),
            deprecated: None,
        }
    }

    pub fn required(ty: AttrType) -> Self {
        Self {
            required: true,
            ..Self::base(ty)
        }
    }

    pub fn optional(ty: AttrType) -> Self {
        Self {
            optional: true,
            ..Self::base(ty)
        }
    }

    /// Set by the vendor only
    pub fn computed(ty: AttrType) -> Self {
        Self {
            computed: true,
            ..Self::base(ty)
        }
    }

    /// Set by the user, or by the vendor when the user leaves it out
    pub fn optional_computed(ty: AttrType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::base(ty)
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn validate(mut self, f: ValidateFn) -> Self {
        self.validate = Some(f);
        self
    }

    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn conflicts_with(mut self, keys: &[&'static str]) -> Self {
        self.conflicts_with = keys.to_vec();
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    /// Never read from user input
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    fn descriptor_problems(&self, name: &str, out: &mut Vec<String>) {
        if self.required && self.default.is_some() {
            out.push(format!("{}: required attributes cannot have a default", name));
        }
        if self.required && self.computed {
            out.push(format!("{}: required attributes cannot be computed", name));
        }
        if self.is_computed_only() && (self.default.is_some() || self.validate.is_some()) {
            out.push(format!("{}: computed-only attributes take no user input", name));
        }
        if self.is_computed_only() && self.force_new {
            out.push(format!("{}: computed-only attributes cannot force replacement", name));
        }
        if !self.required && !self.optional && !self.computed {
            out.push(format!("{}: one of required, optional or computed must be set", name));
        }
        if let Some(schema) = self.ty.object_schema() {
            for problem in schema.descriptor_problems() {
                out.push(format!("{}.{}", name, problem));
            }
        }
    }
}

/// Attribute descriptors of a resource or nested block
#[derive(Clone, Debug, Default)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    /// Add the optional `timeouts { create read update delete }` block.
    pub fn with_timeouts(self) -> Self {
        let duration = || Attribute::optional(AttrType::String);
        self.attr(
            "timeouts",
            Attribute::optional(AttrType::blocks(
                Schema::new()
                    .attr("create", duration())
                    .attr("read", duration())
                    .attr("update", duration())
                    .attr("delete", duration()),
            ))
            .max_items(1),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Descriptor for a dotted path, descending into nested blocks.
    pub fn lookup(&self, path: &AttrPath) -> Option<&Attribute> {
        let mut schema = self;
        let mut found: Option<&Attribute> = None;
        for segment in path.segments() {
            if segment.parse::<usize>().is_ok() {
                continue;
            }
            if let Some(attr) = found {
                match attr.ty.object_schema() {
                    Some(nested) => schema = nested,
                    // map keys
                    None => return found,
                }
            }
            found = Some(schema.attributes.get(segment)?);
        }
        found
    }

    /// Inconsistencies between flags, e.g. a required attribute with a default.
    pub fn descriptor_problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, attr) in &self.attributes {
            attr.descriptor_problems(name, &mut out);
        }
        out
    }

    /// Decode an untyped JSON object. Unknown keys are rejected.
    pub fn decode(&self, json: &Json) -> Result<Block> {
        self.decode_at(&AttrPath::parse(""), json)
    }

    fn decode_at(&self, path: &AttrPath, json: &Json) -> Result<Block> {
        if json.is_null() {
            return Ok(Block::new());
        }
        let object = json.as_object().ok_or_else(|| {
            ProviderError::invalid_attribute(path.to_string(), "expected an object")
        })?;
        let mut block = Block::new();
        for (key, item) in object {
            if key == "id" {
                if let Some(id) = item.as_str() {
                    block.insert("id", id);
                }
                continue;
            }
            let attr = self.attributes.get(key).ok_or_else(|| {
                ProviderError::invalid_attribute(path.child(key).to_string(), "unsupported attribute")
            })?;
            block.insert(key.clone(), attr.ty.decode(&path.child(key), item)?);
        }
        Ok(block)
    }

    /// Check user configuration against the descriptors.
    pub fn validate_config(&self, config: &Block) -> Diagnostics {
        let mut diags = Diagnostics::new();
        self.validate_at(&AttrPath::parse(""), config, &mut diags);
        diags
    }

    fn validate_at(&self, base: &AttrPath, config: &Block, diags: &mut Diagnostics) {
        for (name, attr) in &self.attributes {
            let path = base.child(name);
            let value = config.value(name);

            if value.is_null() {
                if attr.required {
                    diags.push(Diagnostic::error("Missing required argument").at(path));
                }
                continue;
            }
            if value.is_unknown() {
                continue;
            }
            if attr.is_computed_only() {
                diags.push(
                    Diagnostic::error("Value for unconfigurable attribute")
                        .with_detail(format!("{} is computed by the vendor and cannot be set", name))
                        .at(path),
                );
                continue;
            }
            if let Some(message) = attr.deprecated {
                diags.push(Diagnostic::warning("Argument is deprecated").with_detail(message).at(path.clone()));
            }
            for other in &attr.conflicts_with {
                if !config.value(other).is_null() {
                    diags.push(
                        Diagnostic::error("Conflicting configuration arguments")
                            .with_detail(format!("{} conflicts with {}", name, other))
                            .at(path.clone()),
                    );
                }
            }
            if let (Some(max), Some(items)) = (attr.max_items, value.as_items()) {
                if items.len() > max {
                    diags.push(
                        Diagnostic::error("Too many list items")
                            .with_detail(format!("at most {} {} block(s) allowed", max, name))
                            .at(path.clone()),
                    );
                }
            }
            if let Some(validate) = attr.validate {
                if let Err(message) = validate(value) {
                    diags.push(Diagnostic::error("Invalid value").with_detail(message).at(path.clone()));
                }
            }
            if let (Some(nested), Some(items)) = (attr.ty.object_schema(), value.as_items()) {
                for (i, item) in items.iter().enumerate() {
                    if let Some(block) = item.as_block() {
                        nested.validate_at(&path.child(i), block, diags);
                    }
                }
            }
        }
    }

    /// Replace sensitive values so a block can be logged or shown in a plan.
    pub fn mask(&self, block: &Block) -> Block {
        block
            .iter()
            .map(|(key, value)| {
                let masked = match self.attributes.get(key) {
                    Some(attr) if attr.sensitive && !value.is_null() && !value.is_unknown() => {
                        Value::String("(sensitive value)".to_string())
                    }
                    Some(attr) => match (attr.ty.object_schema(), value.as_items()) {
                        (Some(nested), Some(items)) => {
                            let masked_items = items
                                .iter()
                                .map(|item| match item.as_block() {
                                    Some(b) => Value::Block(nested.mask(b)),
                                    None => item.clone(),
                                })
                                .collect();
                            if attr.ty.is_set() {
                                Value::Set(masked_items)
                            } else {
                                Value::List(masked_items)
                            }
                        }
                        _ => value.clone(),
                    },
                    None => value.clone(),
                };
                (key.clone(), masked)
            })
            .collect()
    }

    /// Derive a read-only data source schema: every attribute becomes
    /// computed, except `lookup_keys` which become optional lookup inputs.
    pub fn to_data_source(&self, lookup_keys: &[&str]) -> Schema {
        let mut schema = Schema::new();
        for (name, attr) in &self.attributes {
            if name == "timeouts" {
                continue;
            }
            let mut ds = Attribute::computed(read_only_type(&attr.ty));
            ds.description = attr.description;
            ds.sensitive = attr.sensitive;
            if lookup_keys.contains(&name.as_str()) {
                ds.optional = true;
                ds.computed = true;
                ds.diff_suppress = attr.diff_suppress;
                ds.validate = attr.validate;
            }
            schema.attributes.insert(name.clone(), ds);
        }
        schema
    }
}

fn read_only_type(ty: &AttrType) -> AttrType {
    match ty {
        AttrType::List(elem) => AttrType::List(Box::new(read_only_type(elem))),
        AttrType::Set(elem) => AttrType::Set(Box::new(read_only_type(elem))),
        AttrType::Map(elem) => AttrType::Map(Box::new(read_only_type(elem))),
        AttrType::Object(schema) => AttrType::Object(schema.to_data_source(&[])),
        scalar => scalar.clone(),
    }
}
