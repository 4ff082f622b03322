// memory.rs
//! In-process client collaborator
//!
//! Stands in for the external database client so the facade can be driven
//! without a server. Documents live in a `Vec` per collection; the client
//! behaviors the bridge relies on (identity assignment, the `_ns` field,
//! equality queries) are reproduced here and nowhere else.
//!
//! ```text
//! DatabaseFacade ──factory──> MemoryFactory ──create──> MemoryCollection
//!                                                        RwLock<Vec<Document>>
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::{validate_index_name, Collection, DocumentCursor};
use crate::database::{CollectionFactory, DatabaseFacade};
use crate::document::{Document, DocumentId, ID_FIELD, NS_FIELD};
use crate::error::{BridgeError, Result};
use crate::find_options::{apply_projection, FindOptions, UpdateOptions, UpdateOutcome};
use crate::{log_debug, log_trace};

/// Namespace prefix used when none is configured
pub const DEFAULT_NAMESPACE: &str = "mongo";

const SET_OPERATOR: &str = "$set";

/// Factory producing [`MemoryCollection`]s under a namespace prefix
#[derive(Debug, Clone)]
pub struct MemoryFactory {
    namespace: String,
}

impl MemoryFactory {
    pub fn new(namespace: impl Into<String>) -> Self {
        MemoryFactory {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for MemoryFactory {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl CollectionFactory for MemoryFactory {
    fn create(&self, owner: Weak<DatabaseFacade>, name: &str) -> Result<Arc<dyn Collection>> {
        Ok(Arc::new(MemoryCollection::new(owner, &self.namespace, name)))
    }
}

/// Collection backed by an in-memory document list
pub struct MemoryCollection {
    owner: Weak<DatabaseFacade>,
    name: String,
    namespace: String,
    documents: RwLock<Vec<Document>>,
    /// index name -> key document
    indexes: RwLock<BTreeMap<String, Document>>,
}

impl MemoryCollection {
    pub fn new(owner: Weak<DatabaseFacade>, namespace: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        MemoryCollection {
            owner,
            namespace: format!("{}.{}", namespace, name),
            name,
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Value written to `_ns` on save, e.g. `mongo.test`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn count(&self) -> usize {
        self.documents.read().len()
    }

    /// Index definitions recorded by `ensure_index`
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().keys().cloned().collect()
    }

    /// Reject a malformed mutation before any document is touched
    fn check_mutation(mutation: &Document) -> Result<()> {
        match mutation.get(SET_OPERATOR) {
            Some(Value::Object(_)) | None => Ok(()),
            Some(other) => Err(BridgeError::InvalidArgument(format!(
                "$set expects a document, got {}",
                other
            ))),
        }
    }

    fn apply_mutation(target: &mut Document, mutation: &Document) -> Result<()> {
        match mutation.get(SET_OPERATOR) {
            Some(Value::Object(fields)) => {
                for (field, value) in fields {
                    target.set(field.clone(), value.clone());
                }
                Ok(())
            }
            Some(other) => Err(BridgeError::InvalidArgument(format!(
                "$set expects a document, got {}",
                other
            ))),
            None => {
                // Replacement: keep identity and namespace
                let id = target.get(ID_FIELD).cloned();
                let ns = target.get(NS_FIELD).cloned();
                let mut replaced = Document::new();
                if let Some(id) = id {
                    replaced.set(ID_FIELD, id);
                }
                if let Some(ns) = ns {
                    replaced.set(NS_FIELD, ns);
                }
                for (field, value) in mutation.iter() {
                    if field != ID_FIELD && field != NS_FIELD {
                        replaced.set(field.clone(), value.clone());
                    }
                }
                *target = replaced;
                Ok(())
            }
        }
    }

    fn upsert_document(&self, selector: &Document, mutation: &Document) -> Result<Document> {
        let mut doc = Document::new();
        // Only plain equality fields of the selector seed the new document
        for (field, value) in selector.iter() {
            if !field.starts_with('$') {
                doc.set(field.clone(), value.clone());
            }
        }
        Self::apply_mutation(&mut doc, mutation)?;
        self.save(doc)
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &Weak<DatabaseFacade> {
        &self.owner
    }

    /// Assigns `_id` when absent and stamps `_ns`. A caller-supplied `_id`
    /// of any type is kept as is.
    fn apply(&self, doc: &mut Document) -> Result<()> {
        if !doc.contains(ID_FIELD) {
            let id = DocumentId::new_object_id();
            // Identity first, the way the client lays documents out
            let mut with_id = Document::new();
            with_id.set_id(&id);
            for (field, value) in doc.iter() {
                if field != ID_FIELD {
                    with_id.set(field.clone(), value.clone());
                }
            }
            *doc = with_id;
        }
        doc.set(NS_FIELD, self.namespace.clone());
        Ok(())
    }

    fn save(&self, mut doc: Document) -> Result<Document> {
        self.apply(&mut doc)?;
        let id = doc.get(ID_FIELD).cloned();

        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.get(ID_FIELD) == id.as_ref()) {
            Some(existing) => {
                log_trace!("{}: replacing document {:?}", self.namespace, id);
                *existing = doc.clone();
            }
            None => documents.push(doc.clone()),
        }
        Ok(doc)
    }

    fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>> {
        let wanted = id.to_value();
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .find(|d| d.get(ID_FIELD) == Some(&wanted))
            .cloned())
    }

    fn find(
        &self,
        query: &Document,
        projection: Option<&Document>,
        options: FindOptions,
    ) -> Result<DocumentCursor> {
        // Snapshot; the cursor never observes later writes
        let matched: Vec<Document> = {
            let documents = self.documents.read();
            documents.iter().filter(|d| d.matches(query)).cloned().collect()
        };

        let limit = options.limit().unwrap_or(usize::MAX);
        let projection = projection.cloned();
        let iter = matched
            .into_iter()
            .skip(options.skip())
            .take(limit)
            .map(move |d| match &projection {
                Some(p) => apply_projection(&d, p),
                None => d,
            });
        Ok(DocumentCursor::new(iter))
    }

    fn remove(&self, selector: &Document) -> Result<u64> {
        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|d| !d.matches(selector));
        let removed = (before - documents.len()) as u64;
        log_debug!("{}: removed {} documents", self.namespace, removed);
        Ok(removed)
    }

    fn update(
        &self,
        selector: &Document,
        mutation: &Document,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        Self::check_mutation(mutation)?;

        let (matched, post_image) = {
            let mut documents = self.documents.write();
            let mut matched = 0u64;
            let mut post_image = None;
            for doc in documents.iter_mut().filter(|d| d.matches(selector)) {
                Self::apply_mutation(doc, mutation)?;
                matched += 1;
                if !options.multi {
                    post_image = Some(doc.clone());
                    break;
                }
            }
            (matched, post_image)
        };

        if matched == 0 && options.upsert {
            let inserted = self.upsert_document(selector, mutation)?;
            return Ok(if options.multi {
                UpdateOutcome::Multi(1)
            } else {
                UpdateOutcome::Single(Some(inserted))
            });
        }

        Ok(if options.multi {
            UpdateOutcome::Multi(matched)
        } else {
            UpdateOutcome::Single(post_image)
        })
    }

    fn ensure_index(&self, keys: &Document, name: &str) -> Result<()> {
        validate_index_name(name)?;
        if keys.is_empty() {
            return Err(BridgeError::InvalidArgument(format!(
                "index '{}' has no keys",
                name
            )));
        }

        let mut indexes = self.indexes.write();
        match indexes.get(name) {
            Some(existing) if existing == keys => Ok(()),
            Some(_) => Err(BridgeError::InvalidArgument(format!(
                "index '{}' already exists with different keys",
                name
            ))),
            None => {
                log_debug!("{}: created index '{}'", self.namespace, name);
                indexes.insert(name.to_string(), keys.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn memory_db() -> Arc<DatabaseFacade> {
        DatabaseFacade::new("Mongo", MemoryFactory::default())
    }

    #[test]
    fn test_save_assigns_id_and_namespace() {
        let db = memory_db();
        let test = db.collection("test").unwrap();

        let saved = test.save(doc! { "name" => "mongo", "value" => 123 }).unwrap();
        let fields: Vec<&String> = saved.iter().map(|(k, _)| k).collect();
        assert_eq!(fields, vec!["_id", "name", "value", "_ns"]);
        assert_eq!(saved.display_field("_ns"), "mongo.test");
        assert!(saved.id().is_some());
    }

    #[test]
    fn test_save_replaces_by_id() {
        let db = memory_db();
        let test = db.collection("test").unwrap();

        test.save(doc! { "_id" => 1, "name" => "first" }).unwrap();
        test.save(doc! { "_id" => 1, "name" => "second" }).unwrap();

        let all: Vec<Document> = test
            .find(&Document::new(), None, FindOptions::new())
            .unwrap()
            .collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_field("name"), "second");
        assert_eq!(
            test.find_by_id(&DocumentId::Int(1)).unwrap().unwrap().display_field("name"),
            "second"
        );
        assert_eq!(test.find_by_id(&DocumentId::Int(2)).unwrap(), None);
    }

    #[test]
    fn test_save_keeps_caller_id_of_any_type() {
        let db = memory_db();
        let test = db.collection("test").unwrap();

        let saved = test.save(doc! { "_id" => { "k": 1 }, "name" => "x" }).unwrap();
        assert_eq!(saved.get("_id"), Some(&serde_json::json!({ "k": 1 })));
        assert_eq!(saved.id(), None);

        test.save(doc! { "_id" => { "k": 1 }, "name" => "y" }).unwrap();
        test.save(doc! { "_id" => 1.5, "name" => "z" }).unwrap();
        test.save(doc! { "_id" => (u64::MAX), "name" => "big" }).unwrap();
        assert_eq!(test.remove(&Document::new()).unwrap(), 3);
    }

    #[test]
    fn test_find_one() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        assert_eq!(test.find_one(&doc! { "name" => "a" }).unwrap(), None);

        test.save(doc! { "_id" => 1, "name" => "a" }).unwrap();
        test.save(doc! { "_id" => 2, "name" => "a" }).unwrap();
        let first = test.find_one(&doc! { "name" => "a" }).unwrap().unwrap();
        assert_eq!(first.id(), Some(DocumentId::Int(1)));
    }

    #[test]
    fn test_bad_set_leaves_documents_untouched() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        test.save(doc! { "_id" => 1, "group" => "g", "v" => 0 }).unwrap();
        test.save(doc! { "_id" => 2, "group" => "g", "v" => 0 }).unwrap();

        for options in [UpdateOptions::multi(), UpdateOptions::upsert()] {
            assert!(matches!(
                test.update(&doc! { "group" => "g" }, &doc! { "$set" => 5 }, options),
                Err(BridgeError::InvalidArgument(_))
            ));
        }
        let all: Vec<Document> = test
            .find(&Document::new(), None, FindOptions::new())
            .unwrap()
            .collect();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| d.display_field("v") == "0"));
    }

    #[test]
    fn test_find_with_paging_and_projection() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        for i in 0..5 {
            test.save(doc! { "_id" => i, "kind" => "n", "i" => i }).unwrap();
        }

        let page: Vec<Document> = test
            .find(
                &doc! { "kind" => "n" },
                Some(&doc! { "i" => 1 }),
                FindOptions::new().with_skip(1).with_limit(2),
            )
            .unwrap()
            .collect();
        assert_eq!(page, vec![doc! { "_id" => 1, "i" => 1 }, doc! { "_id" => 2, "i" => 2 }]);
    }

    #[test]
    fn test_cursor_is_a_snapshot() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        test.save(doc! { "_id" => 1 }).unwrap();

        let cursor = test.find(&Document::new(), None, FindOptions::new()).unwrap();
        test.save(doc! { "_id" => 2 }).unwrap();
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn test_remove_counts() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        test.save(doc! { "name" => "a" }).unwrap();
        test.save(doc! { "name" => "a" }).unwrap();
        test.save(doc! { "name" => "b" }).unwrap();

        assert_eq!(test.remove(&doc! { "name" => "a" }).unwrap(), 2);
        assert_eq!(test.remove(&doc! { "name" => "a" }).unwrap(), 0);
        assert_eq!(test.remove(&Document::new()).unwrap(), 1);
    }

    #[test]
    fn test_update_single_multi_upsert() {
        let db = memory_db();
        let test = db.collection("test").unwrap();
        test.save(doc! { "_id" => 1, "group" => "g", "v" => 0 }).unwrap();
        test.save(doc! { "_id" => 2, "group" => "g", "v" => 0 }).unwrap();

        let single = test
            .update(
                &doc! { "group" => "g" },
                &doc! { "$set" => { "v": 1 } },
                UpdateOptions::default(),
            )
            .unwrap();
        match single {
            UpdateOutcome::Single(Some(d)) => assert_eq!(d.display_field("v"), "1"),
            other => panic!("unexpected {:?}", other),
        }

        let multi = test
            .update(&doc! { "group" => "g" }, &doc! { "$set" => { "v": 5 } }, UpdateOptions::multi())
            .unwrap();
        assert_eq!(multi, UpdateOutcome::Multi(2));

        let replaced = test
            .update(&doc! { "_id" => 2 }, &doc! { "fresh" => true }, UpdateOptions::default())
            .unwrap();
        match replaced {
            UpdateOutcome::Single(Some(d)) => {
                assert_eq!(d.id(), Some(DocumentId::Int(2)));
                assert!(!d.contains("group"));
                assert!(d.contains(NS_FIELD));
            }
            other => panic!("unexpected {:?}", other),
        }

        let none = test
            .update(&doc! { "group" => "missing" }, &doc! { "v" => 9 }, UpdateOptions::default())
            .unwrap();
        assert_eq!(none, UpdateOutcome::Single(None));

        let upserted = test
            .update(&doc! { "group" => "new" }, &doc! { "$set" => { "v": 9 } }, UpdateOptions::upsert())
            .unwrap();
        match upserted {
            UpdateOutcome::Single(Some(d)) => {
                assert_eq!(d.display_field("group"), "new");
                assert_eq!(d.display_field("v"), "9");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ensure_index_idempotent() {
        let factory = MemoryFactory::new("app");
        let db = DatabaseFacade::new("App", factory);
        let handle = db.collection("editors").unwrap();

        handle.ensure_index(&doc! { "platform" => 1 }, "platforms").unwrap();
        handle.ensure_index(&doc! { "platform" => 1 }, "platforms").unwrap();
        assert!(matches!(
            handle.ensure_index(&doc! { "name" => 1 }, "platforms"),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            handle.ensure_index(&doc! { "name" => 1 }, ""),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            handle.ensure_index(&Document::new(), "empty"),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_namespace_and_index_names() {
        let owner = Weak::new();
        let coll = MemoryCollection::new(owner, "app", "editors");
        assert_eq!(coll.namespace(), "app.editors");
        coll.ensure_index(&doc! { "b" => 1 }, "b_1").unwrap();
        coll.ensure_index(&doc! { "a" => 1 }, "a_1").unwrap();
        assert_eq!(coll.index_names(), vec!["a_1", "b_1"]);
        coll.save(doc! { "x" => 1 }).unwrap();
        assert_eq!(coll.count(), 1);
    }
}
