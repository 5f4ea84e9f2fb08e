use std::fmt;

use crate::shell::error::ShellError;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    Redirect(RedirectOp),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
    Error,  // 2>
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            RedirectOp::Input => "<",
            RedirectOp::Output => ">",
            RedirectOp::Append => ">>",
            RedirectOp::Error => "2>",
        };
        f.write_str(op)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Pipe => f.write_str("|"),
            Token::Redirect(op) => write!(f, "{}", op),
        }
    }
}

/// 变量查找：名字 -> 当前值，未设置返回 None
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    lookup: Lookup<'a>,
}

/// 把一整行切分为 token 序列
pub fn tokenize(line: &str, lookup: Lookup<'_>) -> Result<Vec<Token>, ShellError> {
    let mut lexer = Lexer::new(line, lookup);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '|' | '<' | '>')
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, lookup: Lookup<'a>) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            lookup,
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, ShellError> {
        loop {
            self.skip_whitespace();

            let c = match self.peek_char() {
                None => return Ok(None),
                Some(c) => c,
            };
            let token = match c {
                '|' => {
                    self.read_char();
                    Token::Pipe
                }
                '<' => {
                    self.read_char();
                    Token::Redirect(RedirectOp::Input)
                }
                '>' => {
                    self.read_char();
                    self.read_output_redirect(RedirectOp::Output)
                }
                '1' | '2' if self.peek_nth(1) == Some('>') => {
                    self.read_char();
                    self.read_char();
                    if c == '1' {
                        self.read_output_redirect(RedirectOp::Output)
                    } else if self.peek_char() == Some('>') {
                        return Err(ShellError::syntax("`2>>` is not supported"));
                    } else {
                        Token::Redirect(RedirectOp::Error)
                    }
                }
                _ => match self.read_word()? {
                    Some(word) => Token::Word(word),
                    // 整个单词都是展开为空的变量，按 POSIX 规则丢弃
                    None => continue,
                },
            };
            return Ok(Some(token));
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.input.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn read_output_redirect(&mut self, op: RedirectOp) -> Token {
        if self.peek_char() == Some('>') {
            self.read_char();
            Token::Redirect(RedirectOp::Append)
        } else {
            Token::Redirect(op)
        }
    }

    /// 读取一个逻辑单词；返回 None 表示该单词只由空展开组成
    fn read_word(&mut self) -> Result<Option<String>, ShellError> {
        let mut word = String::new();
        let mut quoted = false;

        if self.peek_char() == Some('~') {
            let boundary = match self.peek_nth(1) {
                None => true,
                Some(c) => c == '/' || c.is_whitespace() || is_operator_char(c),
            };
            if boundary {
                self.read_char();
                let lookup = self.lookup;
                let home = shellexpand::tilde_with_context("~", || lookup("HOME"));
                word.push_str(&home);
            }
        }

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || is_operator_char(c) {
                break;
            }
            self.read_char();
            match c {
                '\\' => match self.read_char() {
                    Some(escaped) => {
                        word.push(escaped);
                        quoted = true;
                    }
                    None => word.push('\\'),
                },
                '\'' => {
                    quoted = true;
                    self.read_single_quoted(&mut word)?;
                }
                '"' => {
                    quoted = true;
                    self.read_double_quoted(&mut word)?;
                }
                '$' => self.expand_variable(&mut word)?,
                c => word.push(c),
            }
        }

        if word.is_empty() && !quoted {
            Ok(None)
        } else {
            Ok(Some(word))
        }
    }

    fn read_single_quoted(&mut self, word: &mut String) -> Result<(), ShellError> {
        loop {
            match self.read_char() {
                None => return Err(ShellError::syntax("unterminated single quote")),
                Some('\'') => return Ok(()),
                Some(c) => word.push(c),
            }
        }
    }

    fn read_double_quoted(&mut self, word: &mut String) -> Result<(), ShellError> {
        loop {
            match self.read_char() {
                None => return Err(ShellError::syntax("unterminated double quote")),
                Some('"') => return Ok(()),
                Some('\\') => match self.peek_char() {
                    Some(c @ ('"' | '\\' | '$')) => {
                        self.read_char();
                        word.push(c);
                    }
                    _ => word.push('\\'),
                },
                Some('$') => self.expand_variable(word)?,
                Some(c) => word.push(c),
            }
        }
    }

    /// `$` 已被读取，展开其后的变量名
    fn expand_variable(&mut self, word: &mut String) -> Result<(), ShellError> {
        match self.peek_char() {
            Some('{') => {
                self.read_char();
                let mut name = String::new();
                loop {
                    match self.read_char() {
                        None => return Err(ShellError::syntax("unterminated `${`")),
                        Some('}') => break,
                        Some(c) => name.push(c),
                    }
                }
                let valid = name == "?"
                    || (name.starts_with(is_name_start) && name.chars().all(is_name_char));
                if !valid {
                    return Err(ShellError::syntax(format!("${{{}}}: bad substitution", name)));
                }
                self.push_value(&name, word);
            }
            Some('?') => {
                self.read_char();
                self.push_value("?", word);
            }
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    self.read_char();
                }
                self.push_value(&name, word);
            }
            _ => word.push('$'),
        }
        Ok(())
    }

    fn push_value(&self, name: &str, word: &mut String) {
        if let Some(value) = (self.lookup)(name) {
            word.push_str(&value);
        }
    }
}
