use experimenter_domain::Status;

/// Whether `from -> to` is a transition the state machine in §4.3.3
/// permits. Reset transitions (`error|done|running -> created`) are
/// included; claim/resume/finalize call sites use this to guard against
/// driving a row through an invalid edge.
pub fn is_valid_transition(from: Status, to: Status) -> bool {
    use Status::*;
    matches!(
        (from, to),
        (Created, Running)
            | (CreatedForExecution, Running)
            | (Running, Done)
            | (Running, Error)
            | (Running, Paused)
            | (Paused, Running)
            | (Error, Created)
            | (Done, Created)
            | (Running, Created)
    )
}
