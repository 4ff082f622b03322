// mongo-bridge-core/src/collection.rs
//! Collection handle contract
//!
//! [`Collection`] fixes the signatures every collection handle exposes. All
//! operations default to [`BridgeError::NotImplemented`]; a concrete handle
//! overrides the ones its client collaborator supports. [`CollectionStub`]
//! overrides none of them.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::database::DatabaseFacade;
use crate::document::{Document, DocumentId};
use crate::error::{BridgeError, Result};
use crate::find_options::{FindOptions, UpdateOptions, UpdateOutcome};

/// Lazy, finite, single-pass sequence of documents returned by `find`
pub struct DocumentCursor {
    inner: Box<dyn Iterator<Item = Document> + Send>,
}

impl DocumentCursor {
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Document>,
        I::IntoIter: Send + 'static,
    {
        DocumentCursor {
            inner: Box::new(iter.into_iter()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for DocumentCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.inner.next()
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor").finish_non_exhaustive()
    }
}

/// A named collection inside a [`DatabaseFacade`]
pub trait Collection: Send + Sync {
    /// Collection name, as requested from the facade
    fn name(&self) -> &str;

    /// Non-owning back-reference to the owning facade
    fn owner(&self) -> &Weak<DatabaseFacade>;

    /// Owning facade, if it is still alive
    fn database(&self) -> Option<Arc<DatabaseFacade>> {
        self.owner().upgrade()
    }

    /// `"<database>.<collection>"`
    fn full_name(&self) -> String {
        match self.database() {
            Some(db) => format!("{}.{}", db.name(), self.name()),
            None => self.name().to_string(),
        }
    }

    /// Store a document, returning it as stored (with identity)
    fn save(&self, _doc: Document) -> Result<Document> {
        Err(BridgeError::not_implemented("save"))
    }

    /// Augment a document before storage
    fn apply(&self, _doc: &mut Document) -> Result<()> {
        Err(BridgeError::not_implemented("apply"))
    }

    fn find_by_id(&self, _id: &DocumentId) -> Result<Option<Document>> {
        Err(BridgeError::not_implemented("find_by_id"))
    }

    fn find(
        &self,
        _query: &Document,
        _projection: Option<&Document>,
        _options: FindOptions,
    ) -> Result<DocumentCursor> {
        Err(BridgeError::not_implemented("find"))
    }

    /// First document matching `query`, if any
    fn find_one(&self, query: &Document) -> Result<Option<Document>> {
        Ok(self
            .find(query, None, FindOptions::new().with_limit(1))?
            .next())
    }

    /// Number of documents removed
    fn remove(&self, _selector: &Document) -> Result<u64> {
        Err(BridgeError::not_implemented("remove"))
    }

    fn update(
        &self,
        _selector: &Document,
        _mutation: &Document,
        _options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        Err(BridgeError::not_implemented("update"))
    }

    /// Idempotent for equal `(keys, name)`
    fn ensure_index(&self, _keys: &Document, _name: &str) -> Result<()> {
        Err(BridgeError::not_implemented("ensure_index"))
    }
}

impl fmt::Debug for dyn Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Collection handle with no client behind it
#[derive(Debug)]
pub struct CollectionStub {
    owner: Weak<DatabaseFacade>,
    name: String,
}

impl CollectionStub {
    pub fn new(owner: Weak<DatabaseFacade>, name: impl Into<String>) -> Self {
        CollectionStub {
            owner,
            name: name.into(),
        }
    }
}

impl Collection for CollectionStub {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &Weak<DatabaseFacade> {
        &self.owner
    }
}

/// Index names must be non-empty
pub fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::InvalidArgument(
            "index name must not be empty".to_string(),
        ));
    }
    Ok(())
}
