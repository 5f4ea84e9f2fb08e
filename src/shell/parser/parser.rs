use std::vec::IntoIter;

use super::ast::{Command, Pipeline, Redirection};
use super::lexer::{RedirectOp, Token};
use crate::shell::error::ShellError;

pub struct Parser {
    tokens: IntoIter<Token>,
    current_token: Option<Token>,
}

/// 把 token 序列组装为 Pipeline
pub fn parse(tokens: Vec<Token>) -> Result<Pipeline, ShellError> {
    Parser::new(tokens).parse_pipeline()
}

fn unexpected(token: Option<&Token>) -> ShellError {
    match token {
        Some(token) => ShellError::syntax(format!("near unexpected token `{}`", token)),
        None => ShellError::syntax("near unexpected token `newline`"),
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens.into_iter();
        let current_token = tokens.next();
        Parser {
            tokens,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.tokens.next();
    }

    pub fn parse_pipeline(&mut self) -> Result<Pipeline, ShellError> {
        let mut commands = Vec::new();
        if self.current_token.is_none() {
            return Pipeline::new(commands);
        }

        loop {
            let command = self.parse_simple_command()?;

            match self.current_token {
                Some(Token::Pipe) => {
                    if command.stdout_target.is_some() {
                        return Err(ShellError::syntax(format!(
                            "`{}` redirects stdout but is piped into another command",
                            command.program()
                        )));
                    }
                    commands.push(command);
                    self.next_token();
                    if self.current_token.is_none() {
                        // 结尾的 `|` 后面没有命令
                        return Err(unexpected(None));
                    }
                }
                _ => {
                    commands.push(command);
                    break;
                }
            }
        }

        Pipeline::new(commands)
    }

    fn parse_simple_command(&mut self) -> Result<Command, ShellError> {
        let mut command = Command::default();

        // 解析参数和重定向
        loop {
            match &self.current_token {
                None | Some(Token::Pipe) => break,
                Some(Token::Redirect(op)) => {
                    let op = *op;
                    let redirection = self.parse_redirection(op)?;
                    match op {
                        RedirectOp::Output | RedirectOp::Append => {
                            command.stdout_target = Some(redirection)
                        }
                        RedirectOp::Error => command.stderr_target = Some(redirection),
                        RedirectOp::Input => {
                            return Err(ShellError::syntax("input redirection `<` is not supported"))
                        }
                    }
                }
                Some(Token::Word(word)) => {
                    command.argv.push(word.clone());
                    self.next_token();
                }
            }
        }

        if command.argv.is_empty() {
            return Err(unexpected(self.current_token.as_ref()));
        }
        Ok(command)
    }

    fn parse_redirection(&mut self, operator: RedirectOp) -> Result<Redirection, ShellError> {
        self.next_token(); // 跳过重定向操作符

        match &self.current_token {
            Some(Token::Word(filename)) => {
                let redirection = Redirection {
                    operator,
                    filename: filename.clone(),
                };
                self.next_token();
                Ok(redirection)
            }
            other => Err(unexpected(other.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::lexer::tokenize;

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    fn parse_line(line: &str) -> Result<Pipeline, ShellError> {
        parse(tokenize(line, &no_vars)?)
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_simple_command() {
        let pipeline = parse_line("ls -l").unwrap();
        assert_eq!(pipeline.len(), 1);

        let cmd = &pipeline.commands()[0];
        assert_eq!(cmd.program(), "ls");
        assert_eq!(cmd.arguments(), ["-l".to_string()]);
        assert!(cmd.stdout_target.is_none());
        assert!(cmd.stderr_target.is_none());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_empty_input() {
        assert!(parse_line("").unwrap().is_empty());
        assert!(parse_line("   ").unwrap().is_empty());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipeline() {
        let pipeline = parse_line("ls -l | grep foo | wc -l").unwrap();
        let cmds = pipeline.commands();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].argv, vec!["ls", "-l"]);
        assert_eq!(cmds[1].argv, vec!["grep", "foo"]);
        assert_eq!(cmds[2].argv, vec!["wc", "-l"]);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirection() {
        let pipeline = parse_line("echo hello > output.txt 2> err.txt").unwrap();
        let cmd = &pipeline.commands()[0];
        assert_eq!(cmd.argv, vec!["echo", "hello"]);

        let stdout = cmd.stdout_target.as_ref().unwrap();
        assert_eq!(stdout.filename, "output.txt");
        assert_eq!(stdout.operator, RedirectOp::Output);

        let stderr = cmd.stderr_target.as_ref().unwrap();
        assert_eq!(stderr.filename, "err.txt");
        assert_eq!(stderr.operator, RedirectOp::Error);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirection_before_arguments() {
        let pipeline = parse_line("> out echo a >> log b").unwrap();
        let cmd = &pipeline.commands()[0];
        assert_eq!(cmd.argv, vec!["echo", "a", "b"]);
        // 同一个流的后一个重定向覆盖前一个
        let stdout = cmd.stdout_target.as_ref().unwrap();
        assert_eq!(stdout.filename, "log");
        assert_eq!(stdout.operator, RedirectOp::Append);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_stderr_redirection_on_interior_stage() {
        let pipeline = parse_line("make 2> errors.log | tail -n 1 > last.txt").unwrap();
        let cmds = pipeline.commands();
        assert_eq!(cmds[0].stderr_target.as_ref().unwrap().filename, "errors.log");
        assert_eq!(cmds[1].stdout_target.as_ref().unwrap().filename, "last.txt");
    }

    #[test]
    fn test_interior_stdout_redirection_is_rejected() {
        assert!(matches!(parse_line("a > f | b"), Err(ShellError::Syntax(_))));
        assert!(matches!(parse_line("a >> f | b"), Err(ShellError::Syntax(_))));
    }

    #[test]
    fn test_dangling_operators() {
        for line in ["ls |", "| ls", "ls || wc", "echo >", "echo > | wc", "2> err", "echo 2>"] {
            assert!(
                matches!(parse_line(line), Err(ShellError::Syntax(_))),
                "expected syntax error for {:?}",
                line
            );
        }
    }

    #[test]
    fn test_input_redirection_is_rejected() {
        assert!(matches!(parse_line("sort < data.txt"), Err(ShellError::Syntax(_))));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_display_round_trip() {
        let pipeline = parse_line("grep -r needle src").unwrap();
        let rendered = pipeline.commands()[0].to_string();
        assert_eq!(rendered, "grep -r needle src");

        let reparsed = parse_line(&rendered).unwrap();
        assert_eq!(reparsed, pipeline);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_display_quotes_special_words() {
        let pipeline = parse_line("echo 'a b' \"it's\" > 'out file'").unwrap();
        let rendered = pipeline.to_string();
        assert_eq!(parse_line(&rendered).unwrap(), pipeline);
    }
}
