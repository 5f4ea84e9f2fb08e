use std::path::PathBuf;

use log::{debug, warn};
pub use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig};

use crate::shell::completion::ShellHelper;
use crate::utils::config::Config;

pub struct ReadlineManager {
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl ReadlineManager {
    pub fn new(config: &Config, search_path: Vec<PathBuf>) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ShellHelper::new(search_path)));
        Ok(Self { editor })
    }

    /// 把之前会话的记录放入编辑器，供上下键翻阅
    pub fn seed_history(&mut self, lines: &[String]) {
        for line in lines {
            if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                warn!("无法加载历史记录: {}", err);
                return;
            }
        }
        debug!("编辑器历史记录: {} 条", lines.len());
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) -> Result<bool, ReadlineError> {
        self.editor.add_history_entry(line)
    }
}
