//! Host attribute tree
//!
//! The host hands every resource an untyped tree of attributes. [`Value`]
//! keeps the distinctions the host makes: an attribute can be null, unknown
//! until apply, a scalar, or a collection; nested blocks are [`Block`]s.

use serde::{Serialize, Serializer};
use serde_json::{json, Map as JsonMap, Number, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

/// Marker used on the wire for values that are only known after apply
pub const UNKNOWN_MARKER: &str = "$unknown";

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    /// Known after apply
    Unknown,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Block(Block),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Whether the value is the zero value of its type: null, `""`, `0`,
    /// `false`, or an empty collection.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Unknown => false,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::List(items) | Value::Set(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Block(block) => block.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Elements of a list or a set
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Untyped JSON form. Unknown values use an `{"$unknown": true}` marker.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Unknown => json!({ UNKNOWN_MARKER: true }),
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) | Value::Set(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<JsonMap<String, Json>>(),
            ),
            Value::Block(block) => block.to_json(),
        }
    }

    pub fn is_unknown_marker(json: &Json) -> bool {
        json.as_object()
            .map(|o| o.len() == 1 && o.get(UNKNOWN_MARKER) == Some(&Json::Bool(true)))
            .unwrap_or(false)
    }

    /// Walk into a nested value.
    pub fn get_path(&self, segments: &[String]) -> Option<&Value> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(self);
        };
        let child = match self {
            Value::Block(block) => block.get(head),
            Value::Map(map) => map.get(head),
            Value::List(items) | Value::Set(items) => {
                head.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }?;
        child.get_path(rest)
    }

    fn set_path(&mut self, segments: &[String], value: Value) {
        let Some((head, rest)) = segments.split_first() else {
            *self = value;
            return;
        };

        if let Ok(index) = head.parse::<usize>() {
            if !matches!(self, Value::List(_) | Value::Set(_) | Value::Map(_)) {
                *self = Value::List(Vec::new());
            }
            if let Value::Map(map) = self {
                map.entry(head.clone()).or_default().set_path(rest, value);
                return;
            }
            if let Value::List(items) | Value::Set(items) = self {
                while items.len() <= index {
                    items.push(empty_container_for(rest));
                }
                items[index].set_path(rest, value);
            }
            return;
        }

        match self {
            Value::Block(block) => block.set_path_segments(segments, value),
            Value::Map(map) => map.entry(head.clone()).or_default().set_path(rest, value),
            _ => {
                let mut block = Block::new();
                block.set_path_segments(segments, value);
                *self = Value::Block(block);
            }
        }
    }
}

fn empty_container_for(rest: &[String]) -> Value {
    match rest.first() {
        Some(next) if next.parse::<usize>().is_ok() => Value::List(Vec::new()),
        Some(_) => Value::Block(Block::new()),
        None => Value::Null,
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => f.write_str("(known after apply)"),
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        Value::Block(block)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::String).collect())
    }
}

/// A nested block: attribute name to value
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block(BTreeMap<String, Value>);

impl Block {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Value of `key`, treating absence as null
    pub fn value(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(key).unwrap_or(&NULL)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).map(|v| !v.is_null()).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn get_path(&self, path: &AttrPath) -> Option<&Value> {
        let (head, rest) = path.segments.split_first()?;
        self.0.get(head)?.get_path(rest)
    }

    pub fn set_path(&mut self, path: &AttrPath, value: Value) {
        self.set_path_segments(&path.segments, value);
    }

    fn set_path_segments(&mut self, segments: &[String], value: Value) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.0.insert(head.clone(), value);
            return;
        }
        let child = self
            .0
            .entry(head.clone())
            .or_insert_with(|| empty_container_for(rest));
        if child.is_null() {
            *child = empty_container_for(rest);
        }
        child.set_path(rest, value);
    }

    pub fn to_json(&self) -> Json {
        Json::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<JsonMap<String, Json>>(),
        )
    }
}

impl FromIterator<(String, Value)> for Block {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Block(iter.into_iter().collect())
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Dotted address of a nested attribute, e.g. `auto_upgrade.0.enable`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn root(name: &str) -> Self {
        Self {
            segments: vec![name.to_string()],
        }
    }

    pub fn child(&self, segment: impl ToString) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment: the top-level attribute name
    pub fn attribute(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }
}

impl From<&str> for AttrPath {
    fn from(path: &str) -> Self {
        AttrPath::parse(path)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl Serialize for AttrPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
