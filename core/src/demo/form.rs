//! Registration form view model
//!
//! Mounts the three registration programs on one host and exposes what a
//! component would: field edits, `submit`, and the view to render.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

use super::programs::{close_form, flag, registry_address_information, registry_general_information};
use super::requests::Requests;
use crate::errors::HostError;
use crate::host::{Host, MountHandle};
use crate::operator::merge;
use crate::types::{Snapshot, Value};

/// What the form shows for the current states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    General { name: String, error: Option<String> },
    Address { city_name: String, error: Option<String> },
    Congratulation,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Loading => write!(f, "Loading..."),
            View::General { name, error } => {
                writeln!(f, "Your Name: [{}]", name)?;
                if let Some(error) = error {
                    writeln!(f, "{}", error)?;
                }
                write!(f, "[Save General]")
            }
            View::Address { city_name, error } => {
                writeln!(f, "City Name: [{}]", city_name)?;
                if let Some(error) = error {
                    writeln!(f, "{}", error)?;
                }
                write!(f, "[Save Address]")
            }
            View::Congratulation => write!(f, "Conglaturation, you're registered!"),
        }
    }
}

pub struct RegistrationForm {
    host: Host,
    user: MountHandle,
    address: MountHandle,
    closing: MountHandle,
}

impl RegistrationForm {
    pub fn mount(requests: Requests, closing_delay: Duration) -> Result<Self, HostError> {
        let mut host = Host::new();
        let user = host.mount_owned("user", Arc::new(registry_general_information(&requests)))?;
        let address =
            host.mount_owned("address", Arc::new(registry_address_information(&requests)))?;
        let closing = host.mount_owned("closing", Arc::new(close_form(closing_delay)))?;

        Ok(Self {
            host,
            user,
            address,
            closing,
        })
    }

    pub fn user(&self) -> Snapshot {
        self.user.state()
    }

    pub fn address(&self) -> Snapshot {
        self.address.state()
    }

    pub fn closing(&self) -> Snapshot {
        self.closing.state()
    }

    pub fn type_name(&self, name: &str) {
        patch(&self.user, json!({ "name": name }));
    }

    pub fn type_city(&self, city_name: &str) {
        patch(&self.address, json!({ "cityName": city_name }));
    }

    /// Flag a submission of whichever step is current
    pub fn submit(&self) {
        if !flag(&self.user.state(), "isSubmitted") {
            patch(&self.user, json!({ "isSubmitting": true }));
            return;
        }

        if !flag(&self.address.state(), "isSubmitted") {
            patch(&self.address, json!({ "isSubmitting": true }));
        }
    }

    /// Run every program until nothing is left to do
    pub async fn settle(&mut self) -> Result<(), HostError> {
        loop {
            self.host.run_until_idle().await?;

            // The closing step starts once the address is stored
            let submitted = flag(&self.address.state(), "isSubmitted");
            if !submitted || flag(&self.closing.state(), "isFinish") {
                return Ok(());
            }
            debug!("address submitted, finishing form");
            patch(&self.closing, json!({ "isFinish": true }));
        }
    }

    pub fn render(&self) -> View {
        View::of(&self.user.state(), &self.address.state(), &self.closing.state())
    }

    /// Follow state changes without borrowing the form
    pub fn watch(&self) -> FormWatch {
        FormWatch {
            user: self.user.subscribe(),
            address: self.address.subscribe(),
            closing: self.closing.subscribe(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.closing.is_done()
    }
}

impl View {
    /// View for the given step states
    pub fn of(user: &Value, address: &Value, closing: &Value) -> View {
        if !flag(user, "isSubmitted") {
            if flag(user, "isLoading") {
                return View::Loading;
            }
            return View::General {
                name: text(user, "name"),
                error: error(user),
            };
        }

        if !flag(address, "isSubmitted") {
            if flag(address, "isLoading") {
                return View::Loading;
            }
            return View::Address {
                city_name: text(address, "cityName"),
                error: error(address),
            };
        }

        if flag(closing, "isShowConglaturation") {
            return View::Congratulation;
        }

        View::Loading
    }
}

/// Receives a fresh view whenever one of the step states changes
pub struct FormWatch {
    user: watch::Receiver<Snapshot>,
    address: watch::Receiver<Snapshot>,
    closing: watch::Receiver<Snapshot>,
}

impl FormWatch {
    /// Wait for the next change; `None` once the form is gone
    pub async fn changed(&mut self) -> Option<View> {
        let result = tokio::select! {
            r = self.user.changed() => r,
            r = self.address.changed() => r,
            r = self.closing.changed() => r,
        };
        result.ok()?;

        let user = self.user.borrow_and_update().clone();
        let address = self.address.borrow_and_update().clone();
        let closing = self.closing.borrow_and_update().clone();
        Some(View::of(&user, &address, &closing))
    }
}

fn patch(handle: &MountHandle, patch: Value) {
    if let Some(setter) = handle.setter() {
        setter.set(move |state| merge(state, patch));
    }
}

fn text(state: &Value, key: &str) -> String {
    state[key].as_str().unwrap_or_default().to_string()
}

fn error(state: &Value) -> Option<String> {
    state["error"]
        .as_str()
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
