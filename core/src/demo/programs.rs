//! The three programs behind the registration form
//!
//! Each one owns its state: it seeds it with `InitialState`, waits for the
//! form to flag a submission and runs the requests, reporting progress
//! through `isLoading`, `error` and `isSubmitted`.

use std::time::Duration;

use serde_json::json;

use super::requests::Requests;
use crate::operator::{get_state, initial_state, merge, set_state, wait_state, wait_time};
use crate::program::script::*;
use crate::types::Value;

/// Truthiness of a boolean field
pub fn flag(state: &Value, key: &str) -> bool {
    state[key].as_bool().unwrap_or(false)
}

pub fn is_valid_user(user: &Value) -> bool {
    user["name"].as_str().is_some_and(|name| !name.is_empty())
}

pub fn is_valid_address(address: &Value) -> bool {
    address["cityName"]
        .as_str()
        .is_some_and(|city| city.chars().count() > 3)
}

/// `isLoading` on, run `request`, then break out of the retry loop
///
/// A failure stores its message and clears `isSubmitting` so the form can be
/// submitted again. `isLoading` is cleared on every way out.
fn submission(request: Vec<Stmt>) -> Vec<Stmt> {
    let mut body = request;
    body.push(brk());

    vec![
        yield_op(|_| set_state(|s| merge(s, json!({ "isLoading": true })))),
        try_catch_finally(
            body,
            "error",
            vec![yield_op(|env| {
                let message = var(env, "error")["message"].clone();
                set_state(move |s| merge(s, json!({ "error": message, "isSubmitting": false })))
            })],
            vec![yield_op(|_| set_state(|s| merge(s, json!({ "isLoading": false }))))],
        ),
    ]
}

fn submitted() -> Stmt {
    yield_op(|_| set_state(|s| merge(s, json!({ "error": "", "isSubmitted": true }))))
}

pub fn registry_general_information(requests: &Requests) -> ScriptFactory {
    let requests = requests.clone();

    let mut attempt = vec![yield_op(|_| {
        wait_state(|user| is_valid_user(user) && flag(user, "isSubmitting"))
    })];
    attempt.extend(submission(vec![
        bind("user", |_| get_state()),
        yield_op(move |env| requests.save_user(var(env, "user"))),
    ]));

    script(
        "registry_general_information",
        vec![
            yield_op(|_| {
                initial_state(json!({
                    "name": "",
                    "isSubmitting": false,
                    "isLoading": false,
                    "isSubmitted": false,
                    "error": "",
                }))
            }),
            loop_body(attempt),
            submitted(),
        ],
    )
}

pub fn registry_address_information(requests: &Requests) -> ScriptFactory {
    let check = requests.clone();
    let save = requests.clone();

    let mut attempt = vec![yield_op(|_| {
        wait_state(|address| is_valid_address(address) && flag(address, "isSubmitting"))
    })];
    attempt.extend(submission(vec![
        bind("address", |_| get_state()),
        bind("checkingHash", move |env| check.check_address(var(env, "address"))),
        yield_op(move |env| save.save_address(var(env, "address"), var(env, "checkingHash"))),
    ]));

    script(
        "registry_address_information",
        vec![
            yield_op(|_| {
                initial_state(json!({
                    "cityName": "",
                    "isSubmitting": false,
                    "isLoading": false,
                    "isSubmitted": false,
                    "error": "",
                }))
            }),
            loop_body(attempt),
            submitted(),
        ],
    )
}

pub fn close_form(delay: Duration) -> ScriptFactory {
    script(
        "close_form",
        vec![
            yield_op(|_| initial_state(json!({ "isFinish": false, "isShowConglaturation": false }))),
            yield_op(|_| wait_state(|s| flag(s, "isFinish"))),
            yield_op(move |_| wait_time(delay)),
            yield_op(|_| set_state(|s| merge(s, json!({ "isShowConglaturation": true })))),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rules() {
        assert!(!is_valid_user(&json!({"name": ""})));
        assert!(is_valid_user(&json!({"name": "Ann"})));
        assert!(!is_valid_user(&json!({})));

        assert!(!is_valid_address(&json!({"cityName": "Rom"})));
        assert!(is_valid_address(&json!({"cityName": "Rome"})));
        assert!(is_valid_address(&json!({"cityName": "Paris"})));
    }

    #[test]
    fn test_flag_defaults_to_false() {
        assert!(flag(&json!({"isFinish": true}), "isFinish"));
        assert!(!flag(&json!({"isFinish": "yes"}), "isFinish"));
        assert!(!flag(&json!({}), "isFinish"));
    }
}
