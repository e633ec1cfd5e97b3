//! Operators
//!
//! An `Operator` describes one suspend-point of a program. Programs yield them,
//! the runner interprets them. The free functions at the bottom of this module
//! are the authoring vocabulary used by program code.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ErrorInfo;
use crate::program::Program;
use crate::types::Value;

/// Boxed future settled by an external collaborator
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Outcome of an external collaborator
pub type CallResult = Result<Value, ErrorInfo>;

/// Side-effecting async function invoked by `Operator::Call`
pub type CallFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<CallResult> + Send + Sync>;

/// Predicate over a domain state snapshot
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Produces the next domain state from a snapshot of the current one
pub type Updater = Box<dyn FnOnce(&Value) -> Value + Send>;

/// One unit of cooperative work for the runner
pub enum Operator {
    /// Seed the runner-owned state; only legal as the very first operator
    InitialState(Value),
    /// Invoke an async collaborator, resume with its value or inject its failure
    Call {
        name: String,
        func: CallFn,
        args: Vec<Value>,
    },
    /// Wait on an already started future (same contract as `Call`)
    Await(BoxFuture<CallResult>),
    /// Suspend until the predicate holds for the current state
    WaitState(Predicate),
    /// One-shot delay
    WaitTime(Duration),
    /// Resume with a snapshot of the current state
    GetState,
    /// Replace the runner-owned state
    SetState(Updater),
    /// Drain a nested program to completion before resuming
    Delegate(Box<dyn Program>),
    /// Terminal
    Done,
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::InitialState(_) => OperatorKind::InitialState,
            Operator::Call { .. } => OperatorKind::Call,
            Operator::Await(_) => OperatorKind::Await,
            Operator::WaitState(_) => OperatorKind::WaitState,
            Operator::WaitTime(_) => OperatorKind::WaitTime,
            Operator::GetState => OperatorKind::GetState,
            Operator::SetState(_) => OperatorKind::SetState,
            Operator::Delegate(_) => OperatorKind::Delegate,
            Operator::Done => OperatorKind::Done,
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::InitialState(state) => f.debug_tuple("InitialState").field(state).finish(),
            Operator::Call { name, args, .. } => f
                .debug_struct("Call")
                .field("name", name)
                .field("args", args)
                .finish(),
            Operator::WaitTime(duration) => f.debug_tuple("WaitTime").field(duration).finish(),
            Operator::Delegate(program) => {
                f.debug_tuple("Delegate").field(&program.name()).finish()
            }
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Fieldless mirror of `Operator`, used for logging and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorKind {
    InitialState,
    Call,
    Await,
    WaitState,
    WaitTime,
    GetState,
    SetState,
    Delegate,
    Done,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorKind::InitialState => "INITIAL_STATE",
            OperatorKind::Call => "CALL",
            OperatorKind::Await => "AWAIT",
            OperatorKind::WaitState => "WAIT_STATE",
            OperatorKind::WaitTime => "WAIT_TIME",
            OperatorKind::GetState => "GET_STATE",
            OperatorKind::SetState => "SET_STATE",
            OperatorKind::Delegate => "DELEGATE",
            OperatorKind::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Operator retained across a suspension boundary
///
/// Only an unsatisfied `WaitState` and the terminal `Done` ever outlive a
/// drain; everything else resolves inside the pass that produced it.
#[derive(Clone)]
pub enum Pending {
    WaitState(Predicate),
    Done,
}

impl Pending {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Pending::WaitState(_) => OperatorKind::WaitState,
            Pending::Done => OperatorKind::Done,
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pending({})", self.kind())
    }
}

/* ===================== Constructors ===================== */

pub fn initial_state(state: Value) -> Operator {
    Operator::InitialState(state)
}

/// Call an async collaborator with the given arguments
pub fn call<F, Fut>(name: impl Into<String>, func: F, args: Vec<Value>) -> Operator
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    Operator::Call {
        name: name.into(),
        func: Arc::new(move |args| Box::pin(func(args))),
        args,
    }
}

/// Wait on a future that is already in flight
pub fn wait_promise<Fut>(future: Fut) -> Operator
where
    Fut: Future<Output = CallResult> + Send + 'static,
{
    Operator::Await(Box::pin(future))
}

pub fn wait_state<P>(predicate: P) -> Operator
where
    P: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Operator::WaitState(Arc::new(predicate))
}

pub fn wait_time(duration: Duration) -> Operator {
    Operator::WaitTime(duration)
}

pub fn get_state() -> Operator {
    Operator::GetState
}

pub fn set_state<F>(updater: F) -> Operator
where
    F: FnOnce(&Value) -> Value + Send + 'static,
{
    Operator::SetState(Box::new(updater))
}

pub fn delegate(program: impl Program + 'static) -> Operator {
    Operator::Delegate(Box::new(program))
}

pub fn done() -> Operator {
    Operator::Done
}

/// Shallow-merge `patch` into an object state, producing a new value
///
/// Mirrors the `{ ...state, key: value }` update shape used by most updaters.
/// Non-object states are replaced by the patch.
pub fn merge(state: &Value, patch: Value) -> Value {
    match (state, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut next = base.clone();
            next.extend(patch);
            Value::Object(next)
        }
        (_, patch) => patch,
    }
}
