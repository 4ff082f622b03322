// mongo-bridge-core/src/find_options.rs
// Find/update options and projection handling

use serde_json::Value;

use crate::document::{Document, ID_FIELD};
use crate::error::{BridgeError, Result};

/// Paging for `find`. Limit 0 means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    skip: usize,
    limit: usize,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate host-supplied (signed) paging values
    pub fn from_signed(skip: i64, limit: i64) -> Result<Self> {
        if skip < 0 {
            return Err(BridgeError::InvalidArgument(format!(
                "skip must be >= 0, got {}",
                skip
            )));
        }
        if limit < 0 {
            return Err(BridgeError::InvalidArgument(format!(
                "limit must be >= 0, got {}",
                limit
            )));
        }
        Ok(FindOptions {
            skip: skip as usize,
            limit: limit as usize,
        })
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    /// `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }
}

/// Flags for `update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert when nothing matches
    pub upsert: bool,
    /// Touch every match instead of the first
    pub multi: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        UpdateOptions {
            upsert: true,
            multi: false,
        }
    }

    pub fn multi() -> Self {
        UpdateOptions {
            upsert: false,
            multi: true,
        }
    }
}

/// Result of `update`: the post-image for single updates, a count for multi
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Single(Option<Document>),
    Multi(u64),
}

/// Apply a projection document (field → 1 include / 0 exclude).
///
/// Include mode keeps the listed fields plus `_id` unless `_id: 0`.
/// Exclude mode drops the top-level fields marked 0; `_id: 1` is a no-op.
pub fn apply_projection(doc: &Document, projection: &Document) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }

    let included = |v: &Value| match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    };

    let include_mode = projection
        .iter()
        .any(|(field, v)| field != ID_FIELD && included(v));

    if include_mode {
        let mut result = Document::new();
        let keep_id = projection.get(ID_FIELD).map(included).unwrap_or(true);
        if keep_id {
            if let Some(id) = doc.get(ID_FIELD) {
                result.set(ID_FIELD, id.clone());
            }
        }
        for (field, v) in projection.iter() {
            if field == ID_FIELD || !included(v) {
                continue;
            }
            if let Some(value) = doc.get(field) {
                result.set(field.clone(), value.clone());
            }
        }
        result
    } else {
        let mut result = doc.clone();
        for (field, v) in projection.iter() {
            if !included(v) {
                result.remove(field);
            }
        }
        result
    }
}
