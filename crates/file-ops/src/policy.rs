use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::FileOpsError;

/// How a multi-item operation reacts to a failing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, record the item, continue with the next one.
    BestEffortBatch,
    /// Stop at the first failure and return it.
    FailFastSequence,
}

/// Items a sequence finished, and items it skipped past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReport<T> {
    pub done: Vec<T>,
    pub failed: Vec<T>,
}

impl<T> Default for SequenceReport<T> {
    fn default() -> Self {
        Self {
            done: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Runs `op` over `items` in order under `policy`.
///
/// A fatal session error ends the sequence under either policy.
pub fn run_sequence<T, I, F>(
    policy: FailurePolicy,
    items: I,
    mut op: F,
) -> Result<SequenceReport<T>, FileOpsError>
where
    T: Display,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> Result<(), FileOpsError>,
{
    let mut report = SequenceReport::default();
    for item in items {
        match op(&item) {
            Ok(()) => report.done.push(item),
            Err(e) if e.is_fatal() || policy == FailurePolicy::FailFastSequence => {
                error!(item = %item, error = %e, ?policy, "sequence aborted");
                return Err(e);
            }
            Err(e) => {
                warn!(item = %item, error = %e, "item failed, continuing");
                report.failed.push(item);
            }
        }
    }
    Ok(report)
}
