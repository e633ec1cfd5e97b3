//! # Demo
//!
//! A three-step registration form (general information, address, closing)
//! and a nested program walkthrough, both driven through the host.

pub mod form;
pub mod processor;
pub mod programs;
pub mod requests;

#[cfg(test)]
mod tests;

pub use form::{FormWatch, RegistrationForm, View};
pub use processor::Processor;
pub use requests::{fake_request, RequestOptions, Requests};
