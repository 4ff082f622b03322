// src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Name of the identity field
pub const ID_FIELD: &str = "_id";
/// Namespace field added by the client collaborator on save
pub const NS_FIELD: &str = "_ns";

const OBJECT_ID_BYTES: usize = 12;

/// Document identity as handed out by the client collaborator.
/// Untagged so it shows up as a plain value inside documents: {"_id": 2}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
    ObjectId(String),
}

impl DocumentId {
    /// Fresh object id: 12 random bytes as 24 lowercase hex digits
    pub fn new_object_id() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let hex = bytes[..OBJECT_ID_BYTES]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        DocumentId::ObjectId(hex)
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(i) => Value::from(*i),
            DocumentId::String(s) | DocumentId::ObjectId(s) => Value::String(s.clone()),
        }
    }

    /// Read an id back out of a field value. Object ids round-trip as strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocumentId::Int),
            Value::String(s) => Some(DocumentId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(i) => write!(f, "{}", i),
            DocumentId::String(s) | DocumentId::ObjectId(s) => f.write_str(s),
        }
    }
}

/// Ordered bag of named fields. Field order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; only objects are documents
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(BridgeError::Encoding(format!(
                "document must be an object, got {}",
                other
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    /// Field lookup with dot notation ("address.city", "tags.0")
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field.is_empty() {
            return None;
        }
        let mut parts = field.split('.');
        let mut value = self.fields.get(parts.next()?)?;
        for part in parts {
            value = match value {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Top-level set; replaces in place so existing field order is kept
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.fields.get(ID_FIELD).and_then(DocumentId::from_value)
    }

    pub fn set_id(&mut self, id: &DocumentId) {
        self.set(ID_FIELD, id.to_value());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Top-level equality match; an empty query matches everything
    pub fn matches(&self, query: &Document) -> bool {
        query
            .iter()
            .all(|(field, expected)| self.get(field) == Some(expected))
    }

    /// Field value as printed by the exercise program: strings bare,
    /// everything else in JSON form, missing fields as `null`
    pub fn display_field(&self, field: &str) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".to_string(),
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Document { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// `doc! { "name" => "mongo", "value" => 123 }`
#[macro_export]
macro_rules! doc {
    () => { $crate::document::Document::new() };
    ($($key:expr => $value:tt),+ $(,)?) => {{
        let mut d = $crate::document::Document::new();
        $( d.set($key, $crate::__serde_json::json!($value)); )+
        d
    }};
}
