//! experimenter-core: backend-independent contracts and pure logic.
//!
//! Defines the `SqlDialect` seam (§4.5) that `experimenter-adapters`
//! implements, the `WorkTableManager`/`ExperimentDispatcher`/`ResultProcessor`
//! async traits that `experimenter-persistence` implements, and every piece
//! of logic that needs no database connection to test: Cartesian product
//! expansion, dedup-tuple coercion, and state-machine transition validity.

pub mod dialect;
pub mod errors;
pub mod fill;
pub mod state_machine;
pub mod traits;

pub use dialect::SqlDialect;
pub use errors::CoreError;
pub use fill::{cross_join, product, Assignment};
pub use state_machine::is_valid_transition;
pub use traits::{ExperimentDispatcher, Keyfields, ResultProcessor, WorkTableManager};
