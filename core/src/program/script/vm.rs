//! Virtual Machine state
//!
//! The VM holds all execution state:
//! - frames: Stack of active statements
//! - env: Script variables
//! - control: Current control flow state (return, break, throw, ...)
//! - resume_value: Input handed over by the runner for the pending yield

use super::types::{Control, Env, Frame, FrameKind, Stmt, TryPhase, YieldPhase};
use crate::errors::ErrorInfo;
use crate::operator::Operator;
use crate::program::Resume;
use crate::types::Value;

/* ===================== VM ===================== */

#[derive(Debug, Clone)]
pub struct VM {
    /// Stack of execution frames
    pub frames: Vec<Frame>,

    pub env: Env,

    /// Current control flow state
    pub control: Control,

    /// Set by `resume`, consumed by the yield frame waiting for it
    pub resume_value: Option<Resume>,

    /// Set once the program has finished (either way)
    pub outcome: Option<Result<Value, ErrorInfo>>,
}

impl VM {
    /// Create a new VM with a program
    ///
    /// The program is wrapped in a root frame; nothing runs until the first step.
    pub fn new(program: Stmt, env: Env) -> Self {
        let mut vm = VM {
            frames: vec![],
            env,
            control: Control::None,
            resume_value: None,
            outcome: None,
        };

        push_stmt(&mut vm, &program);

        vm
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/* ===================== Frame Management ===================== */

/// Push a new frame for a statement onto the stack
///
/// This determines the initial phase based on the statement type.
pub fn push_stmt(vm: &mut VM, stmt: &Stmt) {
    let kind = match stmt {
        Stmt::Block { .. } => FrameKind::Block { idx: 0 },
        Stmt::Yield { .. } => FrameKind::Yield {
            phase: YieldPhase::Emit,
        },
        Stmt::Loop { .. } => FrameKind::Loop,
        Stmt::Break => FrameKind::Break,
        Stmt::Continue => FrameKind::Continue,
        Stmt::Try { .. } => FrameKind::Try {
            phase: TryPhase::Enter,
            stashed: None,
        },
        Stmt::Return { .. } => FrameKind::Return,
        Stmt::Throw { .. } => FrameKind::Throw,
    };

    vm.frames.push(Frame {
        kind,
        node: stmt.clone(),
    });
}

/// Replace the kind of the top frame
pub fn set_top_kind(vm: &mut VM, kind: FrameKind) {
    if let Some(frame) = vm.frames.last_mut() {
        frame.kind = kind;
    }
}

/* ===================== Step Result ===================== */

/// Result of executing one step
#[derive(Debug)]
pub enum Step {
    /// Continue to next step
    Continue,
    /// Suspend on an operator
    Yield(Operator),
    /// Execution complete
    Done,
}
