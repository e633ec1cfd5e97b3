//! Test helpers for script tests

use crate::operator::OperatorKind;
use crate::program::{Program, Resume, Yielded};
use crate::types::Value;

/// Resume and expect an operator, returning its kind
pub fn expect_op(program: &mut dyn Program, input: Resume) -> OperatorKind {
    match program.resume(input).expect("script failed") {
        Yielded::Operator(op) => op.kind(),
        Yielded::Complete(val) => panic!("expected an operator, script completed with {val}"),
    }
}

/// Resume and expect completion, returning the value
pub fn expect_complete(program: &mut dyn Program, input: Resume) -> Value {
    match program.resume(input).expect("script failed") {
        Yielded::Complete(val) => val,
        Yielded::Operator(op) => panic!("expected completion, got {:?}", op),
    }
}
