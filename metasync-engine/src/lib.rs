//! Definition and record synchronization between two stores.
//!
//! # Components
//!
//! - **DefinitionCatalog**: every definition of one store, by id and by type
//! - **FieldTypePolicy**: field classification, required-field defaults,
//!   create-time validations
//! - **ReferenceResolver**: translates reference fields from source ids to
//!   target ids via `(type, handle)`
//! - **EntityMatcher**: finds a source record's target counterpart by handle
//! - **Executor**: applies mutations (live) or simulates them (dry run)
//! - **SyncOrchestrator**: the per-run control loop
//!
//! # Run
//!
//! 1. **Setup**: validate the configuration and ping both stores
//! 2. **Catalogs**: load definitions from both stores
//! 3. **Plan**: expand the type selection into ordered tasks
//! 4. **Definitions**: create or update each target definition
//! 5. **Data**: discover referenced types, index their target records, then
//!    fill defaults, translate references and create or update each record
//!
//! # Example
//!
//! ```
//! use metasync_engine::{RunConfig, SyncOrchestrator, TypeSelection};
//! use metasync_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let source = Arc::new(MemoryStore::new("source"));
//! let target = Arc::new(MemoryStore::new("target"));
//! let config = RunConfig::new(TypeSelection::single("author")).with_limit(10);
//!
//! let orchestrator = SyncOrchestrator::new(source, target, config);
//! assert!(!orchestrator.is_live());
//! ```

mod catalog;
mod config;
pub mod diagnostics;
mod error;
pub mod executor;
mod field_policy;
mod matcher;
mod orchestrator;
mod pages;
mod plan;
mod resolver;
mod result;

pub use catalog::DefinitionCatalog;
pub use config::{RunConfig, SyncMode, TypeSelection};
pub use error::{EngineError, EngineResult};
pub use executor::{Executor, LiveExecutor, SimulatingExecutor};
pub use field_policy::{classify_type_name, FieldTypePolicy};
pub use matcher::{EntityMatcher, HandleIndex};
pub use orchestrator::{RunState, SyncOrchestrator};
pub use plan::{SyncPlan, SyncTask};
pub use resolver::{ReferenceResolver, ReferenceStats};
pub use result::{Outcome, SyncCounts, SyncResult};
