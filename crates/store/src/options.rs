//! Transaction options: isolation level and durability policy.

use std::time::Duration;

/// Isolation level requested when a transaction begins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IsolationLevel {
    /// The transaction reads a consistent point-in-time view, unaffected by
    /// concurrent commits; conflicting writes are detected at commit time.
    Snapshot,
    /// Store default: reads observe the latest committed state.
    Committed,
}

/// Minimum replica acknowledgment required for a commit to count as durable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Acknowledgment {
    /// A majority of replicas must confirm the write.
    Majority,
    /// An explicit number of replicas must confirm the write. `Count(0)`
    /// is fire-and-forget.
    Count(u32),
}

/// Durability requirement attached to a transaction's commit.
///
/// If the required acknowledgment is not reached within `max_wait`, the
/// commit is abandoned with a timeout and its durability is undetermined:
/// the mutation may or may not have been applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DurabilityPolicy {
    pub ack: Acknowledgment,
    pub max_wait: Duration,
}

impl DurabilityPolicy {
    pub fn majority(max_wait: Duration) -> Self {
        Self {
            ack: Acknowledgment::Majority,
            max_wait,
        }
    }

    pub fn count(replicas: u32, max_wait: Duration) -> Self {
        Self {
            ack: Acknowledgment::Count(replicas),
            max_wait,
        }
    }
}

impl Default for DurabilityPolicy {
    /// Majority acknowledgment bounded at five seconds.
    fn default() -> Self {
        Self::majority(Duration::from_secs(5))
    }
}

/// Options a transaction is begun with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TxnOptions {
    pub isolation: IsolationLevel,
    pub durability: DurabilityPolicy,
}

impl TxnOptions {
    /// Snapshot isolation with the default durability policy, the
    /// configuration check-then-act workflows run under.
    pub fn snapshot() -> Self {
        Self {
            isolation: IsolationLevel::Snapshot,
            durability: DurabilityPolicy::default(),
        }
    }

    /// Store-default isolation with the default durability policy.
    pub fn committed() -> Self {
        Self {
            isolation: IsolationLevel::Committed,
            durability: DurabilityPolicy::default(),
        }
    }

    pub fn with_durability(mut self, durability: DurabilityPolicy) -> Self {
        self.durability = durability;
        self
    }
}

impl Default for TxnOptions {
    fn default() -> Self {
        Self::snapshot()
    }
}
