//! Nested program demo
//!
//! `generate` visits 1 and 2, delegates to `sub_generate` (3.1, 3.2), visits
//! 4 and then waits until the caller flags `continue` before visiting 5.
//! Runs in external mode: the `continue` flag lives with the caller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tracing::info;

use super::programs::flag;
use crate::errors::HostError;
use crate::host::{Host, MountHandle};
use crate::operator::{call, delegate, wait_promise, wait_state, wait_time, Operator};
use crate::program::script::*;
use crate::types::Value;

type Visits = Arc<Mutex<Vec<Value>>>;

fn visit(visits: &Visits, value: Value) -> Stmt {
    let visits = visits.clone();
    yield_op(move |_| {
        let visits = visits.clone();
        call(
            "visit",
            move |args| {
                for value in args {
                    info!(%value, "visited");
                    visits.lock().push(value);
                }
                async { Ok(Value::Null) }
            },
            vec![value.clone()],
        )
    })
}

fn sleep(delay: Duration) -> Operator {
    wait_promise(async move {
        tokio::time::sleep(delay).await;
        Ok(Value::Null)
    })
}

pub fn sub_generate(visits: &Visits, delay: Duration) -> ScriptFactory {
    script(
        "sub_generate",
        vec![
            visit(visits, json!(3.1)),
            yield_op(move |_| sleep(delay)),
            visit(visits, json!(3.2)),
        ],
    )
}

pub fn generate(visits: &Visits, delay: Duration) -> ScriptFactory {
    let sub = sub_generate(visits, delay);

    script(
        "generate",
        vec![
            visit(visits, json!(1)),
            visit(visits, json!(2)),
            yield_op(move |_| wait_time(delay)),
            visit(visits, json!(3)),
            yield_op(move |_| delegate(sub.script())),
            visit(visits, json!(4)),
            yield_op(|_| wait_state(|s| flag(s, "continue"))),
            visit(visits, json!(5)),
        ],
    )
}

/// Hosts `generate` and records what it visits
pub struct Processor {
    host: Host,
    handle: MountHandle,
    visits: Visits,
}

impl Processor {
    pub fn new(delay: Duration) -> Self {
        let visits: Visits = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new();
        let handle = host.mount_external(
            "processor",
            Arc::new(generate(&visits, delay)),
            json!({ "continue": false }),
        );

        Self {
            host,
            handle,
            visits,
        }
    }

    /// Run until the program waits for `continue` or is done
    pub async fn process(&mut self) -> Result<(), HostError> {
        self.host.run_until_idle().await
    }

    /// Flag `continue`; takes effect on the next `process`
    pub fn resume(&self) -> Result<(), HostError> {
        self.host
            .set_external(self.handle.id(), json!({ "continue": true }))
    }

    pub fn visited(&self) -> Vec<Value> {
        self.visits.lock().clone()
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }
}
