//! Consistency levels to acknowledgement thresholds, and copy results to a verdict

use crate::common::{ConsistencyLevel, ShardFailure, ShardOperationResult};
use serde::{Deserialize, Serialize};

/// Number of copies that must acknowledge a write at `level`.
///
/// `copies` is the copy count of the partition in the snapshot the write was
/// routed with. `Default` is treated as `Quorum`; callers are expected to
/// have substituted their configured level already.
pub fn required_acks(level: ConsistencyLevel, copies: usize) -> usize {
    match level {
        ConsistencyLevel::One => copies.min(1),
        ConsistencyLevel::Quorum | ConsistencyLevel::Default => (copies / 2 + 1).min(copies),
        ConsistencyLevel::All => copies,
    }
}

/// Verdict over the copy results collected so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateWriteResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<ShardFailure>,
    pub required: usize,
    pub acknowledged: bool,
}

/// Count successes and failures and decide whether `required` is reached.
///
/// Failures never prevent a positive verdict once enough copies succeeded.
pub fn interpret(results: &[ShardOperationResult], required: usize) -> AggregateWriteResult {
    let mut successful = 0;
    let mut failures = Vec::new();
    for result in results {
        match result {
            ShardOperationResult::Success(_) => successful += 1,
            ShardOperationResult::Failure(failure) => failures.push(failure.clone()),
        }
    }

    AggregateWriteResult {
        total: results.len(),
        successful,
        failed: failures.len(),
        failures,
        required,
        acknowledged: required > 0 && successful >= required,
    }
}

/// Copy-level summary returned with a single-key write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Copies of the partition, whether or not they answered
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<ShardFailure>,
}

impl ShardInfo {
    pub fn new(total_copies: usize, result: &AggregateWriteResult) -> Self {
        Self {
            total: total_copies,
            successful: result.successful,
            failed: result.failed,
            failures: result.failures.clone(),
        }
    }
}
