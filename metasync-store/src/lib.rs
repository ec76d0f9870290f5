//! Store access for metasync.
//!
//! The engine talks to each platform instance through the [`DataStore`]
//! port. Two adapters are provided:
//! - [`GraphqlStore`] speaks the platform's GraphQL admin API over HTTP
//! - [`MemoryStore`] keeps everything in process, with an inspectable
//!   mutation log, for tests and offline rehearsals
//!
//! Mutating calls never fail on validation problems; those come back as
//! [`UserError`](metasync_types::UserError)s inside a [`MutationOutcome`].
//! A [`StoreError`] always means the call itself did not complete.

mod config;
mod error;
pub mod graphql;
pub mod memory;
mod port;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use graphql::GraphqlStore;
pub use memory::{MemoryStore, MutationRecord};
pub use port::{DataStore, MutationOutcome, Page, QuotaStatus, DEFINITION_PAGE_CAP};
