use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir(home: Option<String>) -> PathBuf {
        match home {
            Some(home) if !home.is_empty() => PathBuf::from(home).join(".config/pipesh"),
            _ => PathBuf::from("tmp"),
        }
    }

    fn default(home: Option<String>) -> Self {
        let config_dir = Self::get_config_dir(home);
        Config {
            name: env!("CARGO_PKG_NAME").to_string(),
            theme: String::from("default"),
            history_file: config_dir.join(".pipesh_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    /// 按 `PIPESH_*` 变量覆盖默认配置
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default(lookup("HOME"));

        if let Some(theme) = lookup("PIPESH_THEME") {
            config.theme = theme;
        }

        if let Some(editor) = lookup("PIPESH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Some(history) = lookup("PIPESH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Some(level) = lookup("PIPESH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Some(dir) = lookup("PIPESH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        config
    }

    pub fn new() -> io::Result<Self> {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let config = Config::from_lookup(|key| env::var(key).ok());

        // 确保历史文件目录存在
        if let Some(parent) = config.history_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(config)
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
