//! Tests for Try/Catch/Finally and unwinding

use super::helpers::{expect_complete, expect_op};
use crate::errors::ErrorInfo;
use crate::operator::{call, get_state, set_state, OperatorKind};
use crate::program::script::*;
use crate::program::{Program, Resume};
use serde_json::json;

fn failing_call() -> Stmt {
    yield_op(|_| call("fail", |_| async { Ok(json!(null)) }, vec![]))
}

#[test]
fn test_catch_binds_failure_as_object() {
    let mut program = script(
        "catch",
        vec![try_catch(
            vec![failing_call()],
            "error",
            vec![return_value(|env| var(env, "error")["message"].clone())],
        )],
    )
    .script();

    assert_eq!(expect_op(&mut program, Resume::Start), OperatorKind::Call);
    let val = expect_complete(
        &mut program,
        Resume::Throw(ErrorInfo::new("HttpError", "Bad request")),
    );
    assert_eq!(val, json!("Bad request"));
    assert_eq!(
        program.env().get("error"),
        Some(&json!({"code": "HttpError", "message": "Bad request"}))
    );
}

#[test]
fn test_finally_runs_after_normal_completion() {
    let mut program = script(
        "finally",
        vec![
            try_finally(
                vec![yield_op(|_| get_state())],
                vec![yield_op(|_| set_state(|s| s.clone()))],
            ),
            return_value(|_| json!("after")),
        ],
    )
    .script();

    assert_eq!(expect_op(&mut program, Resume::Start), OperatorKind::GetState);
    assert_eq!(expect_op(&mut program, Resume::null()), OperatorKind::SetState);
    assert_eq!(expect_complete(&mut program, Resume::null()), json!("after"));
}

#[test]
fn test_finally_runs_on_break_then_leaves_loop() {
    let mut program = script(
        "break_through_finally",
        vec![
            loop_body(vec![try_finally(
                vec![yield_op(|_| get_state()), brk()],
                vec![yield_op(|_| set_state(|s| s.clone()))],
            )]),
            return_value(|_| json!("out")),
        ],
    )
    .script();

    assert_eq!(expect_op(&mut program, Resume::Start), OperatorKind::GetState);
    assert_eq!(expect_op(&mut program, Resume::null()), OperatorKind::SetState);
    assert_eq!(expect_complete(&mut program, Resume::null()), json!("out"));
}

#[test]
fn test_finally_runs_after_catch() {
    let mut program = script(
        "catch_then_finally",
        vec![try_catch_finally(
            vec![failing_call()],
            "error",
            vec![bind("seen", |_| get_state())],
            vec![yield_op(|_| set_state(|s| s.clone()))],
        )],
    )
    .script();

    assert_eq!(expect_op(&mut program, Resume::Start), OperatorKind::Call);
    assert_eq!(
        expect_op(&mut program, Resume::Throw(ErrorInfo::message("boom"))),
        OperatorKind::GetState
    );
    assert_eq!(expect_op(&mut program, Resume::null()), OperatorKind::SetState);
    assert_eq!(expect_complete(&mut program, Resume::null()), json!(null));
}

#[test]
fn test_uncaught_failure_runs_finally_then_escapes() {
    let mut program = script(
        "rethrow",
        vec![try_finally(
            vec![failing_call()],
            vec![yield_op(|_| set_state(|s| s.clone()))],
        )],
    )
    .script();

    expect_op(&mut program, Resume::Start);
    assert_eq!(
        expect_op(&mut program, Resume::Throw(ErrorInfo::message("boom"))),
        OperatorKind::SetState
    );
    let error = program.resume(Resume::null()).unwrap_err();
    assert_eq!(error.message, "boom");
}

#[test]
fn test_throw_inside_finally_replaces_pending_control() {
    let mut program = script(
        "override",
        vec![try_finally(
            vec![return_value(|_| json!("ignored"))],
            vec![throw(|_| ErrorInfo::message("from finally"))],
        )],
    )
    .script();

    let error = program.resume(Resume::Start).unwrap_err();
    assert_eq!(error.message, "from finally");
}

#[test]
fn test_inner_try_without_catch_lets_outer_catch() {
    let mut program = script(
        "nested",
        vec![try_catch(
            vec![try_finally(
                vec![throw(|_| ErrorInfo::new("Inner", "deep"))],
                vec![bind("cleaned", |_| get_state())],
            )],
            "error",
            vec![return_value(|env| {
                json!([var(env, "cleaned"), var(env, "error")["code"]])
            })],
        )],
    )
    .script();

    assert_eq!(expect_op(&mut program, Resume::Start), OperatorKind::GetState);
    let val = expect_complete(&mut program, Resume::Value(json!(true)));
    assert_eq!(val, json!([true, "Inner"]));
}
