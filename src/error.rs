//! Consolidates every crate's error taxonomy into one root type.
//!
//! The teacher repo carried two divergent error enums at this layer
//! (`core_error.rs`, `domain_error.rs`) that covered overlapping ground
//! without ever being unified behind a single `#[from]` boundary. Per the
//! duplicate-and-divergent-revisions design note, this crate collapses that
//! into one `AppError` wrapping each downstream crate's own error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] experimenter_domain::DomainError),

    #[error(transparent)]
    Core(#[from] experimenter_core::CoreError),

    #[error(transparent)]
    Persistence(#[from] experimenter_persistence::PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_a_core_error_transparently() {
        let err: AppError = experimenter_core::CoreError::NoExperimentsLeft.into();
        assert_eq!(err.to_string(), "no experiments left");
    }
}
