//! Error types
//!
//! `ErrorInfo` is the failure payload that travels through programs: it is what
//! a failed `Call` injects and what a script `catch` binds. `RunnerError` and
//! `HostError` are the fatal errors surfaced to whoever drives the scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operator::OperatorKind;
use crate::types::{RunnerId, Value};

/// Failure payload with a code and a human readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Generic error with the default `Error` code
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Object form used when a failure is bound into a program environment
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
        })
    }
}

/// Fatal errors of a single runner
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner `{runner}` is misconfigured: {message}")]
    Configuration { runner: String, message: String },

    #[error("runner `{runner}` received {kind} which is not allowed in {mode} mode")]
    UnsupportedOperator {
        runner: String,
        kind: OperatorKind,
        mode: &'static str,
    },

    #[error("unhandled failure in runner `{runner}`: {source}")]
    Unhandled {
        runner: String,
        #[source]
        source: ErrorInfo,
    },

    #[error("runner `{runner}` was cancelled while {kind} was in flight")]
    Interrupted { runner: String, kind: OperatorKind },

    #[error("runner `{runner}` owns its state and cannot take an external snapshot")]
    OwnedState { runner: String },

    #[error("runner `{runner}` failed earlier and can no longer be activated")]
    Faulted { runner: String },
}

/// Errors raised by the host adapter
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no runner mounted with id {0}")]
    UnknownRunner(RunnerId),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("activation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
