// mongo-bridge-core/src/database.rs
// Database facade: a named handle with a lazy registry of collection handles

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::collection::{Collection, CollectionStub};
use crate::error::{BridgeError, Result};
use crate::{log_debug, log_error, log_trace};

/// Produces the concrete collection handle for a name the facade has not
/// seen yet.
///
/// Called with the registry lock held, so an implementation must not call
/// back into the same facade's [`DatabaseFacade::collection`] or
/// [`DatabaseFacade::collection_names`]. Formatting the owner with `{:?}` is
/// fine; the registry then shows as `<locked>`. The returned
/// handle must report `owner` and `name` unchanged.
pub trait CollectionFactory: Send + Sync {
    fn create(&self, owner: Weak<DatabaseFacade>, name: &str) -> Result<Arc<dyn Collection>>;
}

impl<F> CollectionFactory for F
where
    F: Fn(Weak<DatabaseFacade>, &str) -> Result<Arc<dyn Collection>> + Send + Sync,
{
    fn create(&self, owner: Weak<DatabaseFacade>, name: &str) -> Result<Arc<dyn Collection>> {
        self(owner, name)
    }
}

/// Factory handing out [`CollectionStub`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct StubFactory;

impl CollectionFactory for StubFactory {
    fn create(&self, owner: Weak<DatabaseFacade>, name: &str) -> Result<Arc<dyn Collection>> {
        Ok(Arc::new(CollectionStub::new(owner, name)))
    }
}

/// Named database handle.
///
/// Always lives behind an `Arc` so collection handles can hold a `Weak`
/// back-reference to it. Lookups of equal names return the same handle for
/// the lifetime of the facade.
pub struct DatabaseFacade {
    name: String,
    self_ref: Weak<DatabaseFacade>,
    factory: Box<dyn CollectionFactory>,
    // Held across miss -> factory -> insert
    registry: Mutex<BTreeMap<String, Arc<dyn Collection>>>,
}

impl DatabaseFacade {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Arc<Self>
    where
        F: CollectionFactory + 'static,
    {
        let name = name.into();
        Arc::new_cyclic(|self_ref| DatabaseFacade {
            name,
            self_ref: self_ref.clone(),
            factory: Box::new(factory),
            registry: Mutex::new(BTreeMap::new()),
        })
    }

    /// Facade whose collections are all [`CollectionStub`]s
    pub fn with_stubs(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, StubFactory)
    }

    /// Display name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a collection handle, materializing it on first use
    pub fn collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        if name.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }

        let mut registry = self.registry.lock();
        if let Some(existing) = registry.get(name) {
            log_trace!("{}: registry hit for '{}'", self.name, name);
            return Ok(Arc::clone(existing));
        }

        let created = self.factory.create(self.self_ref.clone(), name)?;
        self.check_created(&created, name)?;

        log_debug!("{}: materialized collection '{}'", self.name, name);
        registry.insert(name.to_string(), Arc::clone(&created));
        Ok(created)
    }

    fn check_created(&self, created: &Arc<dyn Collection>, name: &str) -> Result<()> {
        if created.name() != name {
            log_error!(
                "{}: factory returned '{}' for requested '{}'",
                self.name,
                created.name(),
                name
            );
            return Err(BridgeError::Invariant(format!(
                "factory returned collection '{}' for requested name '{}'",
                created.name(),
                name
            )));
        }
        if !Weak::ptr_eq(created.owner(), &self.self_ref) {
            log_error!("{}: factory returned '{}' owned by another database", self.name, name);
            return Err(BridgeError::Invariant(format!(
                "collection '{}' is not owned by database '{}'",
                name, self.name
            )));
        }
        Ok(())
    }

    /// Cross-database names ("db.collection") are not resolved here
    pub fn collection_from_full_name(&self, full_name: &str) -> Result<Arc<dyn Collection>> {
        Err(BridgeError::NotImplemented(format!(
            "collection_from_full_name('{}')",
            full_name
        )))
    }

    /// Names of the collections materialized so far, in lexicographic order
    pub fn collection_names(&self) -> Vec<String> {
        self.registry.lock().keys().cloned().collect()
    }

    /// Whether `name` has been materialized; does not materialize it
    pub fn has_collection(&self, name: &str) -> bool {
        self.registry.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Physical endpoint; the facade has none
    pub fn connect_point(&self) -> Option<String> {
        None
    }
}

impl fmt::Debug for DatabaseFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("DatabaseFacade");
        out.field("name", &self.name);
        // A factory formatting its owner runs while the registry is held
        match self.registry.try_lock() {
            Some(registry) => out.field("collections", &registry.keys().collect::<Vec<_>>()),
            None => out.field("collections", &format_args!("<locked>")),
        };
        out.finish()
    }
}
