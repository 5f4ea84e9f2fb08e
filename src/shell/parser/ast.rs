use std::fmt;

use super::lexer::RedirectOp;
use crate::shell::error::ShellError;

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub operator: RedirectOp,
    pub filename: String,
}

/// 管道中的一个阶段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub argv: Vec<String>,
    /// `>` 或 `>>`
    pub stdout_target: Option<Redirection>,
    /// `2>`，只支持截断写
    pub stderr_target: Option<Redirection>,
}

impl Command {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn arguments(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(&self.argv))?;
        for redirection in [&self.stdout_target, &self.stderr_target].into_iter().flatten() {
            write!(
                f,
                " {} {}",
                redirection.operator,
                shell_words::quote(&redirection.filename)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// 校验后构造：每个阶段 argv 非空，只有最后一个阶段可以重定向 stdout
    pub fn new(commands: Vec<Command>) -> Result<Self, ShellError> {
        let last = commands.len().saturating_sub(1);
        for (idx, command) in commands.iter().enumerate() {
            if command.argv.is_empty() {
                return Err(ShellError::syntax("empty command in pipeline"));
            }
            if idx != last && command.stdout_target.is_some() {
                return Err(ShellError::syntax(format!(
                    "`{}` redirects stdout but is not the last stage of the pipeline",
                    command.program()
                )));
            }
        }
        Ok(Self { commands })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, command) in self.commands.iter().enumerate() {
            if idx > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}
