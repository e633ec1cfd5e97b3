//! Simulated backend for the registration demo

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::errors::ErrorInfo;
use crate::operator::{call, merge, CallResult, Operator};
use crate::types::Value;

pub const BAD_REQUEST: &str = "Bad request";

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub response: Value,
    pub fail: Option<ErrorInfo>,
}

/// Sleep for `latency`, then resolve with the response or fail
pub async fn fake_request(data: Value, latency: Duration, options: RequestOptions) -> CallResult {
    debug!(%data, ?latency, "fake request");
    tokio::time::sleep(latency).await;

    match options.fail {
        Some(error) => Err(error),
        None => Ok(options.response),
    }
}

/// Request collaborators shared by the registration programs
///
/// Clones share the failure budget.
#[derive(Debug, Clone)]
pub struct Requests {
    latency: Duration,
    failing_saves: Arc<AtomicUsize>,
}

impl Requests {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            failing_saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `count` user saves fail with "Bad request"
    pub fn failing_saves(self, count: usize) -> Self {
        self.failing_saves.store(count, Ordering::SeqCst);
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn take_failure(&self) -> Option<ErrorInfo> {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .ok()
            .map(|_| ErrorInfo::message(BAD_REQUEST))
    }

    pub fn save_user(&self, user: Value) -> Operator {
        let requests = self.clone();
        call(
            "save_user",
            move |mut args| {
                let user = args.pop().unwrap_or(Value::Null);
                let options = RequestOptions {
                    fail: requests.take_failure(),
                    ..Default::default()
                };
                fake_request(user, requests.latency, options)
            },
            vec![user],
        )
    }

    /// Resolves with the checking hash for the address
    pub fn check_address(&self, address: Value) -> Operator {
        let latency = self.latency;
        call(
            "check_address",
            move |mut args| {
                let address = args.pop().unwrap_or(Value::Null);
                let options = RequestOptions {
                    response: json!("hash"),
                    fail: None,
                };
                fake_request(address, latency, options)
            },
            vec![address],
        )
    }

    pub fn save_address(&self, address: Value, checking_hash: Value) -> Operator {
        let latency = self.latency;
        call(
            "save_address",
            move |args| {
                let mut args = args.into_iter();
                let address = args.next().unwrap_or(Value::Null);
                let hash = args.next().unwrap_or(Value::Null);
                let data = merge(&address, json!({ "checkingHash": hash }));
                fake_request(data, latency, RequestOptions::default())
            },
            vec![address, checking_hash],
        )
    }
}
