use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Domain value flowing between programs, operators and the host
pub type Value = serde_json::Value;

/// Immutable domain state snapshot
///
/// Every state change produces a new `Arc`, so two snapshots can be compared
/// by identity with `Arc::ptr_eq`.
pub type Snapshot = Arc<Value>;

/// Identity of a mounted runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunnerId(Uuid);

impl RunnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who owns the domain state a runner works against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The runner owns the state; the program seeds it with `InitialState`
    Owned,
    /// The state is supplied by the caller with each activation
    External,
}

/// Re-entrancy guard state of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
}
