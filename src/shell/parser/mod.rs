pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{Command, Pipeline, Redirection};
pub use lexer::{tokenize, RedirectOp, Token};
pub use parser::parse;
