//! Batch Processor Implementation
//!
//! Accumulates operations against shared targets and runs them as one
//! unit, grouped by target. Within a target, operations run in the order
//! they were added; groups run in order of each target's first
//! appearance.
//!
//! A processor has a single writer. It does no locking of its own beyond
//! taking each target's lock while that target's group runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::operation::{BatchOperation, SharedTarget};
use crate::error::{PerfError, Result};

/// Configuration for batch processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pending count that triggers an automatic execute
    pub batch_size: usize,
    /// When true, only an explicit `execute` runs operations
    pub defer_execution: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            defer_execution: false,
        }
    }
}

impl BatchConfig {
    pub fn new(batch_size: usize, defer_execution: bool) -> Self {
        Self {
            batch_size,
            defer_execution,
        }
    }

    /// Deferred configuration: nothing runs until `execute`
    pub fn deferred() -> Self {
        Self {
            defer_execution: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PerfError::Config("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// An operation failed while a batch was executing.
///
/// The batch has already been cleared when this is returned. `attempted`
/// counts every operation that was started, including the failing one;
/// operations after it were discarded without running.
#[derive(Debug)]
pub struct BatchFailure<E> {
    /// Name of the operation that failed
    pub operation: String,
    /// Operations started in this execute call, the failing one included
    pub attempted: usize,
    /// Error returned by the operation
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for BatchFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch operation `{}` failed after {} attempted operation(s): {}",
            self.operation, self.attempted, self.source
        )
    }
}

impl<E: Error + 'static> Error for BatchFailure<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

struct PendingOperation<T, Op> {
    target: Weak<Mutex<T>>,
    op: Op,
}

/// Accumulates operations and executes them grouped by target
pub struct BatchProcessor<T, Op> {
    config: BatchConfig,
    pending: Vec<PendingOperation<T, Op>>,
    executed_total: u64,
}

impl<T, Op> BatchProcessor<T, Op>
where
    Op: BatchOperation<T>,
{
    /// Create a new batch processor with the given configuration.
    ///
    /// The configuration is not checked here: with `batch_size` 0 and
    /// execution not deferred, every `add` executes immediately. Use
    /// [`try_new`](Self::try_new) to reject such configurations.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            executed_total: 0,
        }
    }

    /// Create a processor after validating `config`
    pub fn try_new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Queue `op` against `target`.
    ///
    /// Unless execution is deferred, reaching `batch_size` pending
    /// operations executes the batch before returning; the executed count
    /// is returned in that case.
    pub fn add(
        &mut self,
        target: &SharedTarget<T>,
        op: Op,
    ) -> std::result::Result<Option<usize>, BatchFailure<Op::Error>> {
        self.pending.push(PendingOperation {
            target: Arc::downgrade(target),
            op,
        });

        if !self.config.defer_execution && self.pending.len() >= self.config.batch_size {
            debug!(pending = self.pending.len(), "Batch full, executing");
            return self.execute().map(Some);
        }
        Ok(None)
    }

    /// Run every pending operation and return how many were attempted.
    ///
    /// The pending list is emptied before anything runs, so operations
    /// are consumed exactly once even when one of them fails. On failure
    /// the remaining operations are dropped and the error is returned.
    pub fn execute(&mut self) -> std::result::Result<usize, BatchFailure<Op::Error>> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let pending = std::mem::take(&mut self.pending);
        let total = pending.len();
        let groups = group_by_target(pending);
        let group_count = groups.len();

        let mut attempted = AttemptCounter {
            lifetime_total: &mut self.executed_total,
            count: 0,
        };
        for (target, ops) in groups {
            let Some(target) = target.upgrade() else {
                debug!(discarded = ops.len(), "Target dropped before batch execution");
                continue;
            };

            let mut guard = target.lock();
            for op in ops {
                let name = op.name().to_string();
                attempted.count += 1;
                if let Err(source) = op.apply(&mut *guard) {
                    let attempted = attempted.count;
                    warn!(
                        operation = %name,
                        attempted,
                        discarded = total - attempted,
                        "Batch operation failed"
                    );
                    return Err(BatchFailure {
                        operation: name,
                        attempted,
                        source,
                    });
                }
            }
        }

        let executed = attempted.count;
        debug!(executed, groups = group_count, "Executed batch");
        Ok(executed)
    }

    /// Number of operations waiting to run
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard pending operations without running them
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "Cleared pending batch");
        }
        self.pending.clear();
    }

    /// Operations attempted over the processor's lifetime
    pub fn executed_total(&self) -> u64 {
        self.executed_total
    }
}

impl<T, Op> Default for BatchProcessor<T, Op>
where
    Op: BatchOperation<T>,
{
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

/// Adds the operations attempted in one `execute` call to the lifetime
/// total when dropped, including when an operation panics.
struct AttemptCounter<'a> {
    lifetime_total: &'a mut u64,
    count: usize,
}

impl Drop for AttemptCounter<'_> {
    fn drop(&mut self) {
        *self.lifetime_total += self.count as u64;
    }
}

/// Partition by target identity, keeping per-target order and ordering
/// groups by first appearance. A pending `Weak` keeps its allocation
/// alive, so the address is a stable identity for the whole batch.
fn group_by_target<T, Op>(
    pending: Vec<PendingOperation<T, Op>>,
) -> Vec<(Weak<Mutex<T>>, Vec<Op>)> {
    let mut index: HashMap<*const Mutex<T>, usize> = HashMap::new();
    let mut groups: Vec<(Weak<Mutex<T>>, Vec<Op>)> = Vec::new();

    for PendingOperation { target, op } in pending {
        let identity = target.as_ptr();
        match index.get(&identity) {
            Some(&slot) => groups[slot].1.push(op),
            None => {
                index.insert(identity, groups.len());
                groups.push((target, vec![op]));
            }
        }
    }
    groups
}

/// Execute `ops` as a single deferred batch and return how many ran.
pub fn run_batch<'a, T, Op, I>(ops: I) -> std::result::Result<usize, BatchFailure<Op::Error>>
where
    T: 'a,
    Op: BatchOperation<T>,
    I: IntoIterator<Item = (&'a SharedTarget<T>, Op)>,
{
    let mut processor = BatchProcessor::new(BatchConfig::deferred());
    for (target, op) in ops {
        processor.add(target, op)?;
    }
    processor.execute()
}
