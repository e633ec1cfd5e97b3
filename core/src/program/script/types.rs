//! Statement tree, control flow and frame types

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ErrorInfo;
use crate::operator::Operator;
use crate::types::Value;

/// Script variables
pub type Env = HashMap<String, Value>;

/// Builds the operator a `Yield` suspends on
pub type OpFn = Arc<dyn Fn(&Env) -> Operator + Send + Sync>;

/// Computes a value from the environment
pub type ExprFn = Arc<dyn Fn(&Env) -> Value + Send + Sync>;

/// Computes a failure from the environment
pub type ErrorFn = Arc<dyn Fn(&Env) -> ErrorInfo + Send + Sync>;

/* ===================== Statements ===================== */

#[derive(Clone)]
pub enum Stmt {
    Block {
        body: Vec<Stmt>,
    },
    /// Suspend on an operator; bind the resumed value if `bind` is set
    Yield {
        op: OpFn,
        bind: Option<String>,
    },
    /// Repeat `body` until a `Break` (or a `Return`/`Throw`) leaves it
    Loop {
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Try {
        body: Box<Stmt>,
        catch: Option<Catch>,
        finally: Option<Box<Stmt>>,
    },
    Return {
        value: Option<ExprFn>,
    },
    Throw {
        error: ErrorFn,
    },
}

/// Catch clause: the failure is bound to `name` as `{ code, message }`
#[derive(Clone)]
pub struct Catch {
    pub name: String,
    pub body: Box<Stmt>,
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Block { body } => f.debug_struct("Block").field("body", body).finish(),
            Stmt::Yield { bind, .. } => f.debug_struct("Yield").field("bind", bind).finish(),
            Stmt::Loop { body } => f.debug_struct("Loop").field("body", body).finish(),
            Stmt::Break => f.write_str("Break"),
            Stmt::Continue => f.write_str("Continue"),
            Stmt::Try {
                body,
                catch,
                finally,
            } => f
                .debug_struct("Try")
                .field("body", body)
                .field("catch", &catch.as_ref().map(|c| &c.name))
                .field("finally", finally)
                .finish(),
            Stmt::Return { value } => f
                .debug_struct("Return")
                .field("value", &value.is_some())
                .finish(),
            Stmt::Throw { .. } => f.write_str("Throw"),
        }
    }
}

/* ===================== Control Flow ===================== */

/// Control flow state
///
/// When control != None, the VM unwinds the stack to find the appropriate handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    None,
    Break,
    Continue,
    Return(Value),
    Throw(ErrorInfo),
}

/* ===================== Phases ===================== */

/// Execution phase for Yield statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum YieldPhase {
    /// Build the operator and hand it out
    Emit = 0,
    /// Waiting for the runner to resume us
    Await = 1,
}

/// Execution phase for Try statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TryPhase {
    Enter = 0,
    Body = 1,
    Catch = 2,
    Finally = 3,
}

/* ===================== Frames ===================== */

/// Frame kind - the type and state of a statement being executed
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Block { idx: usize },
    Yield { phase: YieldPhase },
    Loop,
    Try {
        phase: TryPhase,
        /// Control interrupted by the finally block, re-raised once it completes
        stashed: Option<Control>,
    },
    Break,
    Continue,
    Return,
    Throw,
}

/// Execution frame - one per active statement
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub node: Stmt,
}
