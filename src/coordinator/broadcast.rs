//! Broadcast fan-out
//!
//! Runs one partition-wide operation on the primary copy of every partition
//! in a snapshot. All partitions are attempted; a failing partition is
//! recorded in the result and never cuts the others short. The whole
//! fan-out shares one deadline. A call still running at the deadline is
//! counted as a timeout and left to finish on its own.

use crate::common::{
    CoordinatorMetrics, FailureKind, Operation, Result, ShardFailure, ShardOperationResult,
    ShardRequest,
};
use crate::coordinator::executor::CopyExecutor;
use crate::coordinator::topology::TopologySnapshot;
use crate::coordinator::write::WriteCoordinator;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-partition outcome of a broadcast; `successful + failed == total`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateBroadcastResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<ShardFailure>,
}

impl AggregateBroadcastResult {
    /// One result per partition, in partition order
    pub fn from_results(results: Vec<ShardOperationResult>) -> Self {
        let mut aggregate = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result {
                ShardOperationResult::Success(_) => aggregate.successful += 1,
                ShardOperationResult::Failure(failure) => {
                    aggregate.failed += 1;
                    aggregate.failures.push(failure);
                }
            }
        }
        aggregate
    }
}

/// Roughly 30 years; stands in for deadlines past what `Instant` can hold
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

pub struct BroadcastCoordinator {
    executor: Arc<dyn CopyExecutor>,
    metrics: Arc<CoordinatorMetrics>,
}

impl BroadcastCoordinator {
    pub fn new(executor: Arc<dyn CopyExecutor>, metrics: Arc<CoordinatorMetrics>) -> Self {
        Self { executor, metrics }
    }

    /// Fan `operation` out to every partition of `collection` in `snapshot`.
    ///
    /// Only a collection missing from the snapshot fails the whole call.
    pub async fn execute(
        &self,
        snapshot: &TopologySnapshot,
        collection: &str,
        operation: Operation,
        timeout: Duration,
    ) -> Result<AggregateBroadcastResult> {
        let partitions = snapshot
            .partitions_of(collection)
            .ok_or_else(|| crate::Error::CollectionNotFound(collection.to_string()))?;

        self.metrics.broadcast_requests.inc();
        let start = Instant::now();
        let deadline = deadline_after(timeout);
        tracing::debug!(
            "Broadcasting {} to {} partitions of [{}] (topology v{})",
            operation.name(),
            partitions.len(),
            collection,
            snapshot.version
        );

        let calls = partitions.iter().map(|partition| {
            let executor = self.executor.clone();
            let operation = operation.clone();
            let pid = partition.id.clone();
            let primary = WriteCoordinator::select_primary(partition).cloned();

            async move {
                let primary = match primary {
                    Ok(primary) => primary,
                    Err(e) => {
                        return ShardOperationResult::Failure(ShardFailure::from_error(
                            pid, None, &e,
                        ))
                    }
                };
                let node = primary.node.clone();
                let request = ShardRequest::partition_wide(pid.clone(), operation);
                let call =
                    tokio::spawn(async move { executor.apply(&primary, &request).await });

                match tokio::time::timeout_at(deadline, call).await {
                    Ok(Ok(Ok(location))) => ShardOperationResult::Success(location),
                    Ok(Ok(Err(e))) => {
                        ShardOperationResult::Failure(ShardFailure::from_error(pid, Some(node), &e))
                    }
                    Ok(Err(e)) => ShardOperationResult::Failure(ShardFailure::new(
                        pid,
                        Some(node),
                        FailureKind::Internal,
                        format!("partition task failed: {}", e),
                    )),
                    Err(_) => ShardOperationResult::Failure(ShardFailure::new(
                        pid,
                        Some(node),
                        FailureKind::Timeout,
                        format!("no answer within {:?}", timeout),
                    )),
                }
            }
        });

        let aggregate = AggregateBroadcastResult::from_results(join_all(calls).await);

        let timeouts = aggregate
            .failures
            .iter()
            .filter(|f| f.kind == FailureKind::Timeout)
            .count();
        self.metrics
            .broadcast_partition_failures
            .add(aggregate.failed as u64);
        self.metrics.broadcast_timeouts.add(timeouts as u64);
        self.metrics.broadcast_latency.observe_duration(start.elapsed());

        if aggregate.failed > 0 {
            for failure in &aggregate.failures {
                tracing::warn!(
                    "{} failed on {} ({}): {}",
                    operation.name(),
                    failure.partition,
                    failure.kind,
                    failure.reason
                );
            }
        }
        tracing::info!(
            "{} on [{}]: {}/{} partitions succeeded",
            operation.name(),
            collection,
            aggregate.successful,
            aggregate.total
        );
        Ok(aggregate)
    }
}
