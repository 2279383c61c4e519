//! experimenter-domain: neutral, backend-independent data model.
//!
//! Describes the shape of an experiment table (keyfields, resultfields,
//! logtables), the status lifecycle of a row, and the declarative
//! configuration document that produces a validated schema description.
//!
//! No SQL, no connection pool, no I/O lives here — just the types every
//! other crate in the workspace agrees on.

pub mod config;
pub mod error;
pub mod schema;
pub mod status;

pub use config::ExperimenterConfig;
pub use error::DomainError;
pub use schema::{Keyfield, Logtable, Resultfield, TableSchema, ValueDomain};
pub use status::{RoutineOutcome, Status, StatusFilter};
