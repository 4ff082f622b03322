// mongo-bridge-core/src/lib.rs
// Database facade between a scripting host and an in-process document client

pub mod collection;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod find_options;
pub mod logging;
pub mod memory;
pub mod programs;
pub mod scope;

// Public exports
pub use collection::{Collection, CollectionStub, DocumentCursor};
pub use self::config::{BridgeConfig, JavaProperties, Properties};
pub use database::{CollectionFactory, DatabaseFacade, StubFactory};
pub use document::{Document, DocumentId};
pub use error::{BridgeError, Result};
pub use find_options::{FindOptions, UpdateOptions, UpdateOutcome};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use memory::{MemoryCollection, MemoryFactory};
pub use programs::{run_exercise, run_scope_binder};
pub use scope::{process_slot, AmbientScope, DatabaseSlot, ScopeBinder, ScopeBinding, ScopeValue};

#[doc(hidden)]
pub use serde_json as __serde_json;
