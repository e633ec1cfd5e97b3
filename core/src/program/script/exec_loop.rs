//! Core execution loop
//!
//! `step()` processes one frame at a time, advancing execution phases and
//! managing the frame stack. `run_until_yield()` drives it until the script
//! hands out an operator or finishes.

use super::statements::{execute_block, execute_loop, execute_try, execute_yield};
use super::types::{Catch, Control, FrameKind, Stmt, TryPhase};
use super::vm::{push_stmt, set_top_kind, Step, VM};
use crate::errors::ErrorInfo;
use crate::operator::Operator;
use crate::types::Value;

/* ===================== Public API ===================== */

/// Run the VM until it yields an operator or completes
///
/// Returns `None` once the VM finished; inspect `vm.outcome` for the result.
pub fn run_until_yield(vm: &mut VM) -> Option<Operator> {
    loop {
        match step(vm) {
            Step::Continue => continue,
            Step::Yield(op) => return Some(op),
            Step::Done => return None,
        }
    }
}

/// Execute one step of the VM
pub fn step(vm: &mut VM) -> Step {
    if vm.is_finished() {
        return Step::Done;
    }

    // Active control flow (break/continue/return/throw) unwinds first
    if vm.control != Control::None {
        return unwind(vm);
    }

    let Some(frame_idx) = vm.frames.len().checked_sub(1) else {
        return finish(vm);
    };

    // Clone frame data we need (to avoid borrow checker issues)
    let (kind, node) = {
        let f = &vm.frames[frame_idx];
        (f.kind.clone(), f.node.clone())
    };

    match (kind, node) {
        (FrameKind::Block { idx }, Stmt::Block { body }) => execute_block(vm, idx, &body),

        (FrameKind::Yield { phase }, Stmt::Yield { op, bind }) => {
            execute_yield(vm, phase, &op, bind.as_deref())
        }

        (FrameKind::Loop, Stmt::Loop { body }) => execute_loop(vm, &body),

        (FrameKind::Try { phase, stashed }, Stmt::Try { body, finally, .. }) => {
            execute_try(vm, phase, stashed, &body, finally.as_deref())
        }

        (FrameKind::Break, Stmt::Break) => raise(vm, Control::Break),

        (FrameKind::Continue, Stmt::Continue) => raise(vm, Control::Continue),

        (FrameKind::Return, Stmt::Return { value }) => {
            let val = value.map(|expr| expr(&vm.env)).unwrap_or(Value::Null);
            raise(vm, Control::Return(val))
        }

        (FrameKind::Throw, Stmt::Throw { error }) => {
            let error = error(&vm.env);
            raise(vm, Control::Throw(error))
        }

        // push_stmt always pairs a kind with its statement
        (kind, node) => unreachable!("frame kind {:?} does not match {:?}", kind, node),
    }
}

/// Pop the current frame and set control
fn raise(vm: &mut VM, control: Control) -> Step {
    vm.frames.pop();
    vm.control = control;
    Step::Continue
}

/* ===================== Control Flow ===================== */

/// Unwind the stack while control flow is active
///
/// Pops frames until one handles the control or the stack is empty:
/// - Loop handles Break (exits) and Continue (re-enters)
/// - Try in its body phase handles Throw when it has a catch
/// - Try in its body or catch phase runs its finally for any control,
///   then re-raises the stashed control
fn unwind(vm: &mut VM) -> Step {
    loop {
        let Some(frame) = vm.frames.last() else {
            return finish(vm);
        };

        match (&frame.kind, &vm.control) {
            (FrameKind::Loop, Control::Break) => {
                vm.frames.pop();
                vm.control = Control::None;
                return Step::Continue;
            }

            (FrameKind::Loop, Control::Continue) => {
                // Loop frame stays on top and pushes its body again
                vm.control = Control::None;
                return Step::Continue;
            }

            (FrameKind::Try { phase, .. }, _) => {
                let phase = *phase;
                let Stmt::Try { catch, finally, .. } = frame.node.clone() else {
                    unreachable!("try frame without try statement");
                };
                if let Some(step) = intercept_try(vm, phase, catch, finally) {
                    return step;
                }
                vm.frames.pop();
            }

            _ => {
                vm.frames.pop();
            }
        }
    }
}

fn intercept_try(
    vm: &mut VM,
    phase: TryPhase,
    catch: Option<Catch>,
    finally: Option<Box<Stmt>>,
) -> Option<Step> {
    if phase == TryPhase::Body {
        if let (Control::Throw(error), Some(catch)) = (&vm.control, &catch) {
            vm.env.insert(catch.name.clone(), error.to_value());
            vm.control = Control::None;
            set_top_kind(
                vm,
                FrameKind::Try {
                    phase: TryPhase::Catch,
                    stashed: None,
                },
            );
            push_stmt(vm, &catch.body);
            return Some(Step::Continue);
        }
    }

    if matches!(phase, TryPhase::Body | TryPhase::Catch) {
        if let Some(finally) = finally {
            let stashed = std::mem::replace(&mut vm.control, Control::None);
            set_top_kind(
                vm,
                FrameKind::Try {
                    phase: TryPhase::Finally,
                    stashed: Some(stashed),
                },
            );
            push_stmt(vm, &finally);
            return Some(Step::Continue);
        }
    }

    // Finally phase: a control raised inside finally replaces the stashed one
    None
}

/// Record the outcome once the stack is empty
fn finish(vm: &mut VM) -> Step {
    let control = std::mem::replace(&mut vm.control, Control::None);
    let outcome = match control {
        Control::None => Ok(Value::Null),
        Control::Return(val) => Ok(val),
        Control::Throw(error) => Err(error),
        Control::Break | Control::Continue => Err(ErrorInfo::new(
            "BreakOutsideLoop",
            "break or continue used outside of a loop",
        )),
    };
    vm.outcome = Some(outcome);
    Step::Done
}
