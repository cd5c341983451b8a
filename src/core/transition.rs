//! Validated status transitions for jobs.
//!
//! The transition table is fixed:
//!
//! | from      | allowed to                  |
//! |-----------|-----------------------------|
//! | PENDING   | RUNNING, BLOCKED            |
//! | RUNNING   | COMPLETED, FAILED, BLOCKED  |
//! | COMPLETED | (terminal)                  |
//! | FAILED    | PENDING (retry)             |
//! | BLOCKED   | PENDING (unblock)           |
//!
//! The checks here are pure; the mutations live on
//! [`StatusManager`](crate::state::StatusManager).

use crate::core::schema::Status;
use crate::error::{Error, Result};

/// All valid destination statuses for a given source status.
pub fn valid_transitions(from: Status) -> &'static [Status] {
    match from {
        Status::Pending => &[Status::Running, Status::Blocked],
        Status::Running => &[Status::Completed, Status::Failed, Status::Blocked],
        Status::Completed => &[],
        Status::Failed => &[Status::Pending],
        Status::Blocked => &[Status::Pending],
    }
}

/// Whether the table permits `from -> to`.
pub fn is_valid_transition(from: Status, to: Status) -> bool {
    valid_transitions(from).contains(&to)
}

/// Check a transition and produce the typed rejection if it is not in the
/// table. Mutates nothing.
pub fn check_transition(from: Status, to: Status) -> Result<()> {
    if is_valid_transition(from, to) {
        return Ok(());
    }
    let reason = if from == Status::Completed {
        format!("{} is terminal", from)
    } else {
        format!("transition from {} to {} is not allowed", from, to)
    };
    Err(Error::Transition { from, to, reason })
}

/// Whether `from -> to` is the retry transition that increments a job's
/// `retry_count`.
pub fn is_retry(from: Status, to: Status) -> bool {
    from == Status::Failed && to == Status::Pending
}
