//! Single-partition write coordinator
//!
//! Applies a mutation on the one primary copy of a partition, then sends it
//! to the secondaries concurrently and returns as soon as enough copies
//! acknowledged. Replica calls still in flight at that point keep running in
//! their own tasks.
//!
//! A failure on the primary ends the operation before any replica is
//! contacted. A write whose threshold is never reached fails with
//! `Error::QuorumUnmet`, even though the primary (and possibly some
//! secondaries) applied it.

use crate::common::{
    ConsistencyLevel, CoordinatorMetrics, FailureKind, Result, ShardFailure,
    ShardOperationResult, ShardRequest, WriteLocation,
};
use crate::coordinator::consistency::{interpret, required_acks, ShardInfo};
use crate::coordinator::executor::CopyExecutor;
use crate::coordinator::topology::{Partition, ShardCopy};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Result of an acknowledged single-key write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Location token returned by the primary
    pub location: WriteLocation,
    pub shards: ShardInfo,
}

pub struct WriteCoordinator {
    executor: Arc<dyn CopyExecutor>,
    metrics: Arc<CoordinatorMetrics>,
}

impl WriteCoordinator {
    pub fn new(executor: Arc<dyn CopyExecutor>, metrics: Arc<CoordinatorMetrics>) -> Self {
        Self { executor, metrics }
    }

    /// The single healthy primary copy of a partition.
    ///
    /// A snapshot with no primary, with an unhealthy one, or with more than
    /// one yields `PrimaryUnavailable`.
    pub fn select_primary(partition: &Partition) -> Result<&ShardCopy> {
        let unavailable = |reason: String| crate::Error::PrimaryUnavailable {
            partition: partition.id.clone(),
            reason,
        };

        let mut primaries = partition.primaries();
        let primary = match (primaries.next(), primaries.next()) {
            (Some(primary), None) => primary,
            (None, _) => return Err(unavailable("no primary copy in topology".into())),
            (Some(a), Some(b)) => {
                return Err(unavailable(format!(
                    "conflicting primary copies on {} and {}",
                    a.node, b.node
                )))
            }
        };

        if !primary.state.is_healthy() {
            return Err(unavailable(format!(
                "primary on {} is {:?}",
                primary.node, primary.state
            )));
        }
        Ok(primary)
    }

    pub async fn execute(
        &self,
        partition: &Partition,
        request: ShardRequest,
        level: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<WriteOutcome> {
        let primary = Self::select_primary(partition).map_err(|e| {
            self.metrics.primary_failures.inc();
            e
        })?;
        let total = partition.copies.len();
        let required = required_acks(level, total);
        tracing::debug!(
            "{} {}: primary {} ({} copies, {} required)",
            request.operation.name(),
            partition.id,
            primary.node,
            total,
            required
        );

        let location = self
            .execute_on_primary(partition, primary, &request, timeout)
            .await
            .map_err(|e| {
                self.metrics.primary_failures.inc();
                tracing::warn!("{} failed on primary {}: {}", partition.id, primary.node, e);
                e
            })?;

        let mut results = vec![ShardOperationResult::Success(location.clone())];
        let replica_request = Arc::new(request.for_replica(&location));
        let mut pending = FuturesUnordered::new();

        for copy in partition.secondaries() {
            if !copy.state.is_healthy() {
                self.metrics.replica_failures.inc();
                results.push(ShardOperationResult::Failure(ShardFailure::new(
                    partition.id.clone(),
                    Some(copy.node.clone()),
                    FailureKind::Unreachable,
                    format!("node is {:?}", copy.state),
                )));
                continue;
            }

            let executor = self.executor.clone();
            let metrics = self.metrics.clone();
            let request = replica_request.clone();
            let copy = copy.clone();
            pending.push(tokio::spawn(async move {
                replicate(executor.as_ref(), &copy, &request, timeout, &metrics).await
            }));
        }

        tracing::debug!(
            "{}: replicating to {} secondaries",
            partition.id,
            pending.len()
        );

        let mut verdict = interpret(&results, required);
        while !verdict.acknowledged && verdict.successful + pending.len() >= required {
            match pending.next().await {
                Some(Ok(result)) => results.push(result),
                Some(Err(e)) => results.push(ShardOperationResult::Failure(ShardFailure::new(
                    partition.id.clone(),
                    None,
                    FailureKind::Internal,
                    format!("replica task failed: {}", e),
                ))),
                None => break,
            }
            verdict = interpret(&results, required);
        }

        if !verdict.acknowledged {
            self.metrics.quorum_unmet.inc();
            tracing::warn!(
                "{}: {} of {} copies acknowledged, {} required",
                partition.id,
                verdict.successful,
                total,
                required
            );
            return Err(crate::Error::QuorumUnmet {
                partition: partition.id.clone(),
                required,
                acknowledged: verdict.successful,
                total,
            });
        }

        // Remaining replica tasks are detached when `pending` drops
        tracing::debug!(
            "{}: acknowledged by {} of {} copies ({} still replicating)",
            partition.id,
            verdict.successful,
            total,
            pending.len()
        );
        Ok(WriteOutcome {
            location,
            shards: ShardInfo::new(total, &verdict),
        })
    }

    async fn execute_on_primary(
        &self,
        partition: &Partition,
        primary: &ShardCopy,
        request: &ShardRequest,
        timeout: Duration,
    ) -> Result<WriteLocation> {
        let applied = tokio::time::timeout(timeout, self.executor.apply(primary, request)).await;
        match applied {
            Ok(Ok(location)) => Ok(location),
            Ok(Err(
                e @ (crate::Error::CopyUnreachable { .. }
                | crate::Error::ConnectionFailed(_)
                | crate::Error::ShardNotFound(_)),
            )) => Err(crate::Error::PrimaryUnavailable {
                partition: partition.id.clone(),
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(crate::Error::Timeout(format!(
                "primary {} of {} did not answer within {:?}",
                primary.node, partition.id, timeout
            ))),
        }
    }
}

/// Send the primary's mutation to one secondary
async fn replicate(
    executor: &dyn CopyExecutor,
    copy: &ShardCopy,
    request: &ShardRequest,
    timeout: Duration,
    metrics: &CoordinatorMetrics,
) -> ShardOperationResult {
    let failure = match tokio::time::timeout(timeout, executor.apply(copy, request)).await {
        Ok(Ok(location)) => return ShardOperationResult::Success(location),
        Ok(Err(e)) => {
            ShardFailure::from_error(copy.partition.clone(), Some(copy.node.clone()), &e)
        }
        Err(_) => ShardFailure::new(
            copy.partition.clone(),
            Some(copy.node.clone()),
            FailureKind::Timeout,
            format!("no answer within {:?}", timeout),
        ),
    };

    metrics.replica_failures.inc();
    tracing::warn!(
        "Replication of {} to {} failed ({}): {}",
        copy.partition,
        copy.node,
        failure.kind,
        failure.reason
    );
    ShardOperationResult::Failure(failure)
}
