//! End-to-end runs of the registration form and the processor demo

use std::time::Duration;

use serde_json::json;

use super::form::{RegistrationForm, View};
use super::processor::Processor;
use super::requests::{Requests, BAD_REQUEST};

const LATENCY: Duration = Duration::from_millis(1000);
const CLOSING: Duration = Duration::from_millis(1000);

fn form(requests: Requests) -> RegistrationForm {
    RegistrationForm::mount(requests, CLOSING).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_submit_without_name_issues_no_request() {
    let mut form = form(Requests::new(LATENCY));
    form.settle().await.unwrap();

    form.submit();
    form.settle().await.unwrap();

    let user = form.user();
    assert_eq!(user["isSubmitting"], json!(true));
    assert_eq!(user["isLoading"], json!(false));
    assert_eq!(user["isSubmitted"], json!(false));
    assert_eq!(
        form.render(),
        View::General {
            name: String::new(),
            error: None
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_valid_user_is_saved_and_program_finishes() {
    let mut form = form(Requests::new(LATENCY));
    form.settle().await.unwrap();
    let started = tokio::time::Instant::now();

    form.type_name("Ann");
    form.submit();
    form.settle().await.unwrap();

    assert!(started.elapsed() >= LATENCY);
    assert_eq!(
        *form.user(),
        json!({
            "name": "Ann",
            "isSubmitting": true,
            "isLoading": false,
            "isSubmitted": true,
            "error": "",
        })
    );
    assert_eq!(
        form.render(),
        View::Address {
            city_name: String::new(),
            error: None
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_reports_error_and_waits_for_retry() {
    let mut form = form(Requests::new(LATENCY).failing_saves(1));
    form.settle().await.unwrap();

    form.type_name("Ann");
    form.submit();
    form.settle().await.unwrap();

    let user = form.user();
    assert_eq!(user["error"], json!(BAD_REQUEST));
    assert_eq!(user["isSubmitting"], json!(false));
    assert_eq!(user["isLoading"], json!(false));
    assert_eq!(user["isSubmitted"], json!(false));
    assert_eq!(
        form.render(),
        View::General {
            name: "Ann".to_string(),
            error: Some(BAD_REQUEST.to_string())
        }
    );

    form.submit();
    form.settle().await.unwrap();

    let user = form.user();
    assert_eq!(user["error"], json!(""));
    assert_eq!(user["isSubmitted"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn test_short_city_name_keeps_address_form() {
    let mut form = form(Requests::new(LATENCY));
    form.settle().await.unwrap();
    form.type_name("Ann");
    form.submit();
    form.settle().await.unwrap();

    form.type_city("Rom");
    form.submit();
    form.settle().await.unwrap();

    assert_eq!(form.address()["isSubmitted"], json!(false));
    assert_eq!(
        form.render(),
        View::Address {
            city_name: "Rom".to_string(),
            error: None
        }
    );
    assert!(!form.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_full_registration_reaches_congratulation() {
    let mut form = form(Requests::new(LATENCY));
    form.settle().await.unwrap();
    assert!(matches!(form.render(), View::General { .. }));

    form.type_name("Ann");
    form.submit();
    form.settle().await.unwrap();

    let started = tokio::time::Instant::now();
    form.type_city("Paris");
    form.submit();
    form.settle().await.unwrap();

    // check_address, save_address, then the closing pause
    assert!(started.elapsed() >= LATENCY * 2 + CLOSING);
    assert_eq!(form.address()["isSubmitted"], json!(true));
    assert_eq!(form.closing()["isFinish"], json!(true));
    assert_eq!(form.render(), View::Congratulation);
    assert!(form.is_finished());
}

#[test]
fn test_views_render_as_text() {
    assert_eq!(View::Loading.to_string(), "Loading...");
    assert_eq!(
        View::General {
            name: "Ann".to_string(),
            error: Some(BAD_REQUEST.to_string())
        }
        .to_string(),
        "Your Name: [Ann]\nBad request\n[Save General]"
    );
    assert_eq!(
        View::Address {
            city_name: "Paris".to_string(),
            error: None
        }
        .to_string(),
        "City Name: [Paris]\n[Save Address]"
    );
}

#[tokio::test(start_paused = true)]
async fn test_processor_drains_nested_program_first() {
    let mut processor = Processor::new(Duration::from_millis(1000));

    processor.process().await.unwrap();

    assert_eq!(
        processor.visited(),
        vec![json!(1), json!(2), json!(3), json!(3.1), json!(3.2), json!(4)]
    );
    assert!(!processor.is_done());

    // Nothing changed: still waiting for `continue`
    processor.process().await.unwrap();
    assert_eq!(processor.visited().len(), 6);

    processor.resume().unwrap();
    processor.process().await.unwrap();

    assert_eq!(processor.visited().last(), Some(&json!(5)));
    assert!(processor.is_done());
}
