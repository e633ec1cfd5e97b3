//! # Programs
//!
//! A program is a resumable cooperative routine. Each call to `resume` runs it
//! up to its next suspend-point and hands back the `Operator` it stopped on,
//! or its completion value. The runner feeds the outcome of that operator back
//! in with the next `resume`, either as a value or as an injected failure.
//!
//! Programs can be written by hand against the `Program` trait, or as
//! statement trees executed by the stack-driven interpreter in [`script`].

pub mod script;

use crate::errors::ErrorInfo;
use crate::operator::Operator;
use crate::types::Value;

/// Input handed to a program when it is resumed
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    /// First resumption of a fresh program
    Start,
    /// Resume the pending yield with a value
    Value(Value),
    /// Raise a failure at the pending yield
    Throw(ErrorInfo),
}

impl Resume {
    pub fn null() -> Self {
        Resume::Value(Value::Null)
    }
}

/// What a program produced when it stopped
#[derive(Debug)]
pub enum Yielded {
    Operator(Operator),
    /// The program ran to completion with a return value
    Complete(Value),
}

/// Resumable computation yielding operators
///
/// `Err` means a failure escaped the program unhandled. Once a program has
/// completed (or failed) it must not be resumed again.
pub trait Program: Send {
    fn name(&self) -> &str;

    fn resume(&mut self, input: Resume) -> Result<Yielded, ErrorInfo>;
}

/// Builds fresh program instances
pub trait ProgramFactory: Send + Sync {
    fn create(&self) -> Box<dyn Program>;
}

impl<F> ProgramFactory for F
where
    F: Fn() -> Box<dyn Program> + Send + Sync,
{
    fn create(&self) -> Box<dyn Program> {
        self()
    }
}

/// Error a program returns when it is resumed after it finished
pub fn exhausted(name: &str) -> ErrorInfo {
    ErrorInfo::new(
        "ProgramExhausted",
        format!("program `{}` was resumed after it completed", name),
    )
}
