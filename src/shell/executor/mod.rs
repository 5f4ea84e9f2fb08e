pub mod builtins;
pub mod dispatcher;
#[allow(clippy::module_inception)]
pub mod executor;
pub mod redirect;

pub use builtins::Builtin;
pub use executor::{Endpoint, ExecutionResult, Executor};
