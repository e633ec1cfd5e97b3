//! Statement execution handlers
//!
//! Each statement type has its own handler function that processes
//! the statement based on its current execution phase.

use super::types::{Control, FrameKind, OpFn, Stmt, TryPhase, YieldPhase};
use super::vm::{push_stmt, set_top_kind, Step, VM};
use crate::program::Resume;
use crate::types::Value;

/// Execute Block statement
pub fn execute_block(vm: &mut VM, idx: usize, body: &[Stmt]) -> Step {
    let Some(child_stmt) = body.get(idx) else {
        // Block complete
        vm.frames.pop();
        return Step::Continue;
    };

    set_top_kind(vm, FrameKind::Block { idx: idx + 1 });
    push_stmt(vm, child_stmt);

    Step::Continue
}

/// Execute Yield statement
///
/// First visit builds the operator and suspends. The second visit happens
/// after `resume` and either binds the value or raises the injected failure.
pub fn execute_yield(vm: &mut VM, phase: YieldPhase, op: &OpFn, bind: Option<&str>) -> Step {
    match phase {
        YieldPhase::Emit => {
            let operator = op(&vm.env);
            vm.resume_value = None;
            set_top_kind(
                vm,
                FrameKind::Yield {
                    phase: YieldPhase::Await,
                },
            );
            Step::Yield(operator)
        }

        YieldPhase::Await => {
            vm.frames.pop();
            match vm.resume_value.take() {
                Some(Resume::Throw(error)) => {
                    vm.control = Control::Throw(error);
                }
                Some(Resume::Value(val)) => {
                    if let Some(name) = bind {
                        vm.env.insert(name.to_string(), val);
                    }
                }
                Some(Resume::Start) | None => {
                    if let Some(name) = bind {
                        vm.env.insert(name.to_string(), Value::Null);
                    }
                }
            }
            Step::Continue
        }
    }
}

/// Execute Loop statement
///
/// The loop frame stays on the stack; every time it is on top again the body
/// has completed an iteration, so the body is pushed once more.
pub fn execute_loop(vm: &mut VM, body: &Stmt) -> Step {
    push_stmt(vm, body);
    Step::Continue
}

/// Execute Try statement (normal completion path; unwinding lives in exec_loop)
pub fn execute_try(
    vm: &mut VM,
    phase: TryPhase,
    stashed: Option<Control>,
    body: &Stmt,
    finally: Option<&Stmt>,
) -> Step {
    match phase {
        TryPhase::Enter => {
            set_top_kind(
                vm,
                FrameKind::Try {
                    phase: TryPhase::Body,
                    stashed: None,
                },
            );
            push_stmt(vm, body);
        }

        TryPhase::Body | TryPhase::Catch => match finally {
            Some(finally) => {
                set_top_kind(
                    vm,
                    FrameKind::Try {
                        phase: TryPhase::Finally,
                        stashed: None,
                    },
                );
                push_stmt(vm, finally);
            }
            None => {
                vm.frames.pop();
            }
        },

        TryPhase::Finally => {
            vm.frames.pop();
            if let Some(control) = stashed {
                vm.control = control;
            }
        }
    }

    Step::Continue
}
