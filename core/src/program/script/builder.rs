//! Helpers for writing statement trees
//!
//! ```ignore
//! let program = script(
//!     "close_form",
//!     vec![
//!         yield_op(|_| initial_state(json!({ "isFinish": false }))),
//!         yield_op(|_| wait_state(|s| s["isFinish"] == json!(true))),
//!         yield_op(|_| wait_time(Duration::from_millis(1000))),
//!     ],
//! );
//! ```

use std::sync::Arc;

use super::types::{Catch, Env, Stmt};
use super::ScriptFactory;
use crate::errors::ErrorInfo;
use crate::operator::Operator;
use crate::types::Value;

pub fn script(name: impl Into<String>, body: Vec<Stmt>) -> ScriptFactory {
    ScriptFactory::new(name, block(body))
}

pub fn block(body: Vec<Stmt>) -> Stmt {
    Stmt::Block { body }
}

/// Yield an operator and discard the resumed value
pub fn yield_op<F>(op: F) -> Stmt
where
    F: Fn(&Env) -> Operator + Send + Sync + 'static,
{
    Stmt::Yield {
        op: Arc::new(op),
        bind: None,
    }
}

/// Yield an operator and bind the resumed value to `name`
pub fn bind<F>(name: impl Into<String>, op: F) -> Stmt
where
    F: Fn(&Env) -> Operator + Send + Sync + 'static,
{
    Stmt::Yield {
        op: Arc::new(op),
        bind: Some(name.into()),
    }
}

pub fn loop_body(body: Vec<Stmt>) -> Stmt {
    Stmt::Loop {
        body: Box::new(block(body)),
    }
}

pub fn brk() -> Stmt {
    Stmt::Break
}

pub fn cont() -> Stmt {
    Stmt::Continue
}

pub fn try_catch(body: Vec<Stmt>, name: impl Into<String>, catch: Vec<Stmt>) -> Stmt {
    Stmt::Try {
        body: Box::new(block(body)),
        catch: Some(Catch {
            name: name.into(),
            body: Box::new(block(catch)),
        }),
        finally: None,
    }
}

pub fn try_finally(body: Vec<Stmt>, finally: Vec<Stmt>) -> Stmt {
    Stmt::Try {
        body: Box::new(block(body)),
        catch: None,
        finally: Some(Box::new(block(finally))),
    }
}

pub fn try_catch_finally(
    body: Vec<Stmt>,
    name: impl Into<String>,
    catch: Vec<Stmt>,
    finally: Vec<Stmt>,
) -> Stmt {
    Stmt::Try {
        body: Box::new(block(body)),
        catch: Some(Catch {
            name: name.into(),
            body: Box::new(block(catch)),
        }),
        finally: Some(Box::new(block(finally))),
    }
}

pub fn return_value<F>(value: F) -> Stmt
where
    F: Fn(&Env) -> Value + Send + Sync + 'static,
{
    Stmt::Return {
        value: Some(Arc::new(value)),
    }
}

pub fn throw<F>(error: F) -> Stmt
where
    F: Fn(&Env) -> ErrorInfo + Send + Sync + 'static,
{
    Stmt::Throw {
        error: Arc::new(error),
    }
}

/// Read a variable, `null` when unbound
pub fn var(env: &Env, name: &str) -> Value {
    env.get(name).cloned().unwrap_or(Value::Null)
}
