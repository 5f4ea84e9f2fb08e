use colored::Colorize;
use std::path::Path;

use crate::utils::path::basename;

pub struct Theme {
    pub prompt_symbol: String,
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub interrupt_message: String,
    pub prompt_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_symbol: "$".to_string(),
            error_symbol: "✗".to_string(),
            welcome_message: "pipesh 已就绪，输入 exit 退出".to_string(),
            exit_message: "再见".to_string(),
            interrupt_message: "^C".to_string(),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
        }
    }
}

impl Theme {
    /// 提示符为当前目录名加上提示符号
    pub fn prompt(&self, cwd: &Path) -> String {
        let cwd = cwd.to_string_lossy();
        format!(
            "{} {} ",
            (self.prompt_style)(basename(&cwd).into_owned()),
            (self.prompt_style)(self.prompt_symbol.clone())
        )
    }

    pub fn error_marker(&self, status: i32) -> String {
        (self.error_style)(format!("{} {}", self.error_symbol, status))
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "dark" => Theme {
            prompt_symbol: "➤".to_string(),
            prompt_style: Box::new(|s| s.bright_purple().to_string()),
            error_style: Box::new(|s| s.red().to_string()),
            success_style: Box::new(|s| s.magenta().to_string()),
            ..Theme::default()
        },
        _ => Theme::default(),
    }
}
