pub mod cli;
pub mod config;
pub mod demo;
pub mod errors;
pub mod host;
pub mod operator;
pub mod program;
pub mod runner;
pub mod types;

// Re-export main types
pub use errors::{ErrorInfo, HostError, RunnerError};
pub use host::{Host, MountHandle};
pub use operator::{Operator, OperatorKind};
pub use program::{Program, ProgramFactory, Resume, Yielded};
pub use runner::{Activation, Runner, StateSetter, Suspension};
pub use types::*;
