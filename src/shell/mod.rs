mod completion;
mod error;
mod executor;
mod history;
mod parser;
mod readline;
mod session;
#[allow(clippy::module_inception)]
mod shell;
mod signals;

pub use shell::{run_command, Shell};
