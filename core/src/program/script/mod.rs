//! # Script programs - resumable stack-driven interpreter
//!
//! Programs written as statement trees instead of native coroutines.
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: All state in `frames: Vec<Frame>`, no recursion
//! 2. **Statement-level execution**: Each frame has a phase tracking micro-steps
//! 3. **Centralized control flow**: `Control` enum manages break/continue/return/throw
//! 4. **Pure executor**: No async, no I/O - runs until it yields an operator or completes
//!
//! A `Yield` statement is the only suspend-point. The runner resumes the
//! script with the operator's outcome; failures are raised at the yield and
//! unwind to the nearest `Try`, running `finally` blocks on the way out.

pub mod builder;
pub mod exec_loop;
pub mod statements;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

use crate::errors::ErrorInfo;
use crate::program::{exhausted, Program, ProgramFactory, Resume, Yielded};

// Re-export commonly used items
pub use builder::*;
pub use exec_loop::{run_until_yield, step};
pub use types::{Catch, Control, Env, Stmt};
pub use vm::{Step, VM};

/// A statement tree running as a `Program`
#[derive(Debug, Clone)]
pub struct Script {
    name: String,
    vm: VM,
}

impl Script {
    pub fn new(name: impl Into<String>, body: Stmt) -> Self {
        Self::with_env(name, body, Env::new())
    }

    /// Start with pre-bound variables (program inputs)
    pub fn with_env(name: impl Into<String>, body: Stmt, env: Env) -> Self {
        Self {
            name: name.into(),
            vm: VM::new(body, env),
        }
    }

    pub fn env(&self) -> &Env {
        &self.vm.env
    }

    pub fn is_finished(&self) -> bool {
        self.vm.is_finished()
    }
}

impl Program for Script {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self, input: Resume) -> Result<Yielded, ErrorInfo> {
        if self.vm.is_finished() {
            return Err(exhausted(&self.name));
        }

        if input != Resume::Start {
            self.vm.resume_value = Some(input);
        }

        if let Some(op) = run_until_yield(&mut self.vm) {
            return Ok(Yielded::Operator(op));
        }

        match self.vm.outcome.clone() {
            Some(Ok(val)) => Ok(Yielded::Complete(val)),
            Some(Err(error)) => Err(error),
            None => Err(exhausted(&self.name)),
        }
    }
}

/// Creates a fresh `Script` from the same statement tree on every call
#[derive(Debug, Clone)]
pub struct ScriptFactory {
    name: String,
    body: Stmt,
    env: Env,
}

impl ScriptFactory {
    pub fn new(name: impl Into<String>, body: Stmt) -> Self {
        Self {
            name: name.into(),
            body,
            env: Env::new(),
        }
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> Script {
        Script::with_env(self.name.clone(), self.body.clone(), self.env.clone())
    }
}

impl ProgramFactory for ScriptFactory {
    fn create(&self) -> Box<dyn Program> {
        Box::new(self.script())
    }
}
