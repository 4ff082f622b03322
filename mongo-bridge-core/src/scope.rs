// mongo-bridge-core/src/scope.rs
// Host script scope and the binder that pulls the database handle out of it

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde_json::Value;

use crate::database::DatabaseFacade;
use crate::error::{BridgeError, Result};
use crate::{log_info, log_warn};

/// Symbol the host binds its database handle to
pub const DB_SYMBOL: &str = "db";

/// Message carried by the binder's configuration error
pub const NOT_A_DATABASE: &str = "your database is not a database";

/// A value bound in the host scope
#[derive(Debug, Clone)]
pub enum ScopeValue {
    Database(Arc<DatabaseFacade>),
    /// Any plain script value (number, string, object, ...)
    Script(Value),
}

impl From<Arc<DatabaseFacade>> for ScopeValue {
    fn from(db: Arc<DatabaseFacade>) -> Self {
        ScopeValue::Database(db)
    }
}

impl From<Value> for ScopeValue {
    fn from(value: Value) -> Self {
        ScopeValue::Script(value)
    }
}

/// Outcome of looking up a database handle by symbol
#[derive(Debug, Clone)]
pub enum ScopeBinding {
    Present(Arc<DatabaseFacade>),
    PresentButWrongType,
    Absent,
}

/// Key-addressed environment supplied by the host script engine
#[derive(Debug, Clone, Default)]
pub struct AmbientScope {
    symbols: HashMap<String, ScopeValue>,
}

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Arc<AmbientScope>>> = RefCell::new(None);
}

impl AmbientScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, symbol: impl Into<String>, value: impl Into<ScopeValue>) {
        self.symbols.insert(symbol.into(), value.into());
    }

    pub fn with(mut self, symbol: impl Into<String>, value: impl Into<ScopeValue>) -> Self {
        self.set(symbol, value);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&ScopeValue> {
        self.symbols.get(symbol)
    }

    pub fn database(&self, symbol: &str) -> ScopeBinding {
        match self.symbols.get(symbol) {
            Some(ScopeValue::Database(db)) => ScopeBinding::Present(Arc::clone(db)),
            Some(ScopeValue::Script(_)) => ScopeBinding::PresentButWrongType,
            None => ScopeBinding::Absent,
        }
    }

    /// Make `scope` the current thread's scope, returning the previous one
    pub fn enter(scope: Arc<AmbientScope>) -> Option<Arc<AmbientScope>> {
        CURRENT_SCOPE.with(|current| current.borrow_mut().replace(scope))
    }

    /// Clear the current thread's scope
    pub fn leave() -> Option<Arc<AmbientScope>> {
        CURRENT_SCOPE.with(|current| current.borrow_mut().take())
    }

    /// The current thread's scope, if a host entered one
    pub fn current() -> Option<Arc<AmbientScope>> {
        CURRENT_SCOPE.with(|current| current.borrow().clone())
    }
}

/// Reference cell holding an installed database handle. Last writer wins.
#[derive(Debug, Default)]
pub struct DatabaseSlot {
    inner: RwLock<Option<Arc<DatabaseFacade>>>,
}

impl DatabaseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `db`, returning whatever was there before
    pub fn install(&self, db: Arc<DatabaseFacade>) -> Option<Arc<DatabaseFacade>> {
        self.inner.write().replace(db)
    }

    pub fn get(&self) -> Option<Arc<DatabaseFacade>> {
        self.inner.read().clone()
    }

    pub fn clear(&self) -> Option<Arc<DatabaseFacade>> {
        self.inner.write().take()
    }
}

lazy_static! {
    static ref PROCESS_SLOT: DatabaseSlot = DatabaseSlot::new();
}

/// Process-wide slot written by the binder programs
pub fn process_slot() -> &'static DatabaseSlot {
    &PROCESS_SLOT
}

/// Binds the host's `db` symbol
pub struct ScopeBinder;

impl ScopeBinder {
    /// Read `db` from `scope`, type-check it and install it in `slot`
    pub fn bind(scope: &AmbientScope, slot: &DatabaseSlot) -> Result<Arc<DatabaseFacade>> {
        match scope.database(DB_SYMBOL) {
            ScopeBinding::Present(db) => {
                log_info!("bound database '{}' from scope", db.name());
                slot.install(Arc::clone(&db));
                Ok(db)
            }
            ScopeBinding::PresentButWrongType => {
                log_warn!("scope symbol '{}' is not a database handle", DB_SYMBOL);
                Err(BridgeError::Configuration(NOT_A_DATABASE.to_string()))
            }
            ScopeBinding::Absent => {
                log_warn!("scope has no '{}' symbol", DB_SYMBOL);
                Err(BridgeError::Configuration(NOT_A_DATABASE.to_string()))
            }
        }
    }

    /// Same as [`ScopeBinder::bind`] against the current thread's scope
    pub fn bind_current(slot: &DatabaseSlot) -> Result<Arc<DatabaseFacade>> {
        let scope = AmbientScope::current().ok_or_else(|| {
            log_warn!("no ambient scope entered on this thread");
            BridgeError::Configuration(NOT_A_DATABASE.to_string())
        })?;
        Self::bind(&scope, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_not_a_database(result: Result<Arc<DatabaseFacade>>) {
        match result {
            Err(BridgeError::Configuration(msg)) => assert_eq!(msg, NOT_A_DATABASE),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_valid_database() {
        let db = DatabaseFacade::with_stubs("Mongo");
        let scope = AmbientScope::new().with(DB_SYMBOL, Arc::clone(&db));
        let slot = DatabaseSlot::new();

        let bound = ScopeBinder::bind(&scope, &slot).unwrap();
        assert!(Arc::ptr_eq(&bound, &db));
        assert!(Arc::ptr_eq(&slot.get().unwrap(), &db));
    }

    #[test]
    fn test_bind_absent_symbol() {
        let slot = DatabaseSlot::new();
        assert_not_a_database(ScopeBinder::bind(&AmbientScope::new(), &slot));
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_bind_wrong_type() {
        let scope = AmbientScope::new().with(DB_SYMBOL, json!(42));
        let slot = DatabaseSlot::new();
        assert_not_a_database(ScopeBinder::bind(&scope, &slot));
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_slot_last_writer_wins() {
        let slot = DatabaseSlot::new();
        let first = DatabaseFacade::with_stubs("first");
        let second = DatabaseFacade::with_stubs("second");

        assert!(slot.install(Arc::clone(&first)).is_none());
        let previous = slot.install(Arc::clone(&second)).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(slot.get().unwrap().name(), "second");
        assert!(slot.clear().is_some());
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_bind_current_thread_scope() {
        let slot = DatabaseSlot::new();
        AmbientScope::leave();
        assert_not_a_database(ScopeBinder::bind_current(&slot));

        let db = DatabaseFacade::with_stubs("Mongo");
        AmbientScope::enter(Arc::new(AmbientScope::new().with(DB_SYMBOL, Arc::clone(&db))));
        let bound = ScopeBinder::bind_current(&slot).unwrap();
        assert!(Arc::ptr_eq(&bound, &db));
        assert!(AmbientScope::leave().is_some());
        assert!(AmbientScope::current().is_none());
    }

    #[test]
    fn test_scope_lookup_variants() {
        let db = DatabaseFacade::with_stubs("Mongo");
        let scope = AmbientScope::new()
            .with("db", Arc::clone(&db))
            .with("answer", json!(42));
        assert!(matches!(scope.database("db"), ScopeBinding::Present(_)));
        assert!(matches!(scope.database("answer"), ScopeBinding::PresentButWrongType));
        assert!(matches!(scope.database("nothing"), ScopeBinding::Absent));
        assert!(matches!(scope.get("answer"), Some(ScopeValue::Script(v)) if v == &json!(42)));
    }
}
