//! Choosing which sinks are active.

/// Outcome of the single broker connection attempt made at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    /// No broker address was configured.
    NotConfigured,
    /// A broker was configured but the connection failed.
    Unreachable,
    /// The broker accepted the connection.
    Connected,
}

/// Which sinks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkPlan {
    /// Publish snapshots to the broker.
    pub push: bool,
    /// Serve snapshots on the pull port.
    pub pull: bool,
}

impl SinkPlan {
    /// Push runs only with a connected broker. Pull runs whenever push does
    /// not, or when forced.
    pub fn resolve(status: BrokerStatus, force_pull: bool) -> Self {
        let push = status == BrokerStatus::Connected;
        Self {
            push,
            pull: force_pull || !push,
        }
    }
}
