use std::collections::BTreeSet;
use std::path::PathBuf;

use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::shell::executor::Builtin;
use crate::utils::path::executables_with_prefix;

/// 命令位置补全内建命令和 PATH 中的程序，参数位置补全文件名
pub struct ShellHelper {
    files: FilenameCompleter,
    search_path: Vec<PathBuf>,
}

impl ShellHelper {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self {
            files: FilenameCompleter::new(),
            search_path,
        }
    }

    fn complete_command(&self, prefix: &str) -> Vec<Pair> {
        let mut names: BTreeSet<String> = Builtin::names()
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names.extend(executables_with_prefix(prefix, &self.search_path));

        names
            .into_iter()
            .map(|name| Pair {
                replacement: format!("{} ", name),
                display: name,
            })
            .collect()
    }
}

/// 光标所在单词的起始字节位置
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace() || *c == '|')
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0)
}

fn is_command_position(line: &str, start: usize) -> bool {
    let before = line[..start].trim_end();
    before.is_empty() || before.ends_with('|')
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(line, pos);
        let word = &line[start..pos];
        if is_command_position(line, start) && !word.contains('/') {
            return Ok((start, self.complete_command(word)));
        }
        self.files.complete(line, pos, ctx)
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
