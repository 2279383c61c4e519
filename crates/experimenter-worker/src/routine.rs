use std::collections::HashMap;

use async_trait::async_trait;
use experimenter_core::traits::Keyfields;
use experimenter_core::ResultProcessor;
use experimenter_domain::RoutineOutcome;

/// The `Custom` section of the configuration document, handed to every
/// routine invocation verbatim (§4.1, §6).
pub type Custom = HashMap<String, serde_yaml::Value>;

/// A user-supplied experiment routine (§4.6). Implementors receive the
/// claimed row's id (every `ResultProcessor` method is bound to a row by id
/// rather than holding it internally, §4.4), its keyfield assignment, a
/// processor for writing results/logs, and the configuration document's
/// `Custom` section.
///
/// A trait rather than a plain closure because the routine runs inside a
/// spawned task that must be `'static`; implementors typically hold whatever
/// state they need (model weights, a client, ...) as fields.
#[async_trait]
pub trait ExperimentRoutine: Send + Sync {
    async fn run(
        &self,
        id: i64,
        keyfields: &Keyfields,
        processor: &dyn ResultProcessor,
        custom: &Custom,
    ) -> RoutineOutcome;
}
