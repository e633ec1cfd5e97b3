//! Operator interpretation
//!
//! One call interprets exactly one operator against the current domain state
//! and reports what the drain loop should do next.

use tracing::debug;

use crate::errors::{ErrorInfo, RunnerError};
use crate::operator::{Operator, Pending};
use crate::program::{Program, Resume};
use crate::runner::store::StateStore;
use crate::types::{Mode, Snapshot, Value};

/// What the drain loop does after one operator
pub enum Step {
    /// Resume the current program with a value or an injected failure
    Advance(Resume),
    /// Stop draining; retain the operator for the next activation
    Suspend(Pending),
    /// State was published; stop draining and resume on the next activation
    StateChanged,
    /// Drain a nested program before resuming the current one
    Delegate(Box<dyn Program>),
    /// The current program is finished
    Complete(Value),
}

/// Everything an operator may look at
pub struct Context<'a> {
    pub runner: &'a str,
    pub program: &'a str,
    pub mode: Mode,
    pub store: &'a StateStore,
    /// Snapshot supplied for this activation (external mode)
    pub external: &'a Snapshot,
}

impl Context<'_> {
    /// Domain state an operator observes
    ///
    /// Owned mode reads the live store; external mode sees the snapshot the
    /// activation was started with.
    pub fn current(&self) -> Snapshot {
        match self.mode {
            Mode::Owned => self.store.current(),
            Mode::External => self.external.clone(),
        }
    }

    fn unsupported(&self, op: &Operator) -> RunnerError {
        RunnerError::UnsupportedOperator {
            runner: self.runner.to_string(),
            kind: op.kind(),
            mode: "external",
        }
    }
}

/// Interpret one operator
pub async fn interpret(op: Operator, ctx: &Context<'_>) -> Result<Step, RunnerError> {
    let kind = op.kind();
    debug!(
        runner = ctx.runner,
        state = %ctx.current(),
        "{}::{}",
        ctx.program,
        kind
    );

    match op {
        Operator::InitialState(_) if ctx.mode == Mode::External => Err(ctx.unsupported(&op)),

        Operator::InitialState(_) => Err(RunnerError::Configuration {
            runner: ctx.runner.to_string(),
            message: format!(
                "{} is only allowed as the first operator of `{}`",
                kind, ctx.program
            ),
        }),

        Operator::Call { name, func, args } => {
            let outcome = func(args).await;
            Ok(settle(ctx, &name, outcome))
        }

        Operator::Await(future) => {
            let outcome = future.await;
            Ok(settle(ctx, "promise", outcome))
        }

        Operator::WaitState(predicate) => {
            if predicate(&ctx.current()) {
                Ok(Step::Advance(Resume::null()))
            } else {
                Ok(Step::Suspend(Pending::WaitState(predicate)))
            }
        }

        Operator::WaitTime(duration) => {
            tokio::time::sleep(duration).await;
            Ok(Step::Advance(Resume::null()))
        }

        Operator::GetState => Ok(Step::Advance(Resume::Value((*ctx.current()).clone()))),

        Operator::SetState(_) if ctx.mode == Mode::External => Err(ctx.unsupported(&op)),

        Operator::SetState(updater) => {
            let next = ctx.store.update(updater);
            debug!(runner = ctx.runner, state = %next, "state replaced");
            Ok(Step::StateChanged)
        }

        Operator::Delegate(program) => {
            debug!(
                runner = ctx.runner,
                nested = program.name(),
                "delegating to nested program"
            );
            Ok(Step::Delegate(program))
        }

        Operator::Done => Ok(Step::Complete(Value::Null)),
    }
}

fn settle(ctx: &Context<'_>, name: &str, outcome: Result<Value, ErrorInfo>) -> Step {
    match outcome {
        Ok(val) => Step::Advance(Resume::Value(val)),
        Err(error) => {
            debug!(
                runner = ctx.runner,
                call = name,
                error = %error,
                "call failed, injecting failure into program"
            );
            Step::Advance(Resume::Throw(error))
        }
    }
}
