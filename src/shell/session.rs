use std::collections::HashMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// 内建命令请求对会话做出的修改，由调用方在流水线结束后应用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    ChangeDir(PathBuf),
    Exit(i32),
}

/// 跨行保留的全部状态：工作目录、环境变量快照、历史记录、上一次的退出码
#[derive(Debug, Clone)]
pub struct Session {
    cwd: PathBuf,
    vars: HashMap<String, String>,
    history: Vec<String>,
    last_status: i32,
}

impl Session {
    pub fn new(cwd: PathBuf, vars: HashMap<String, String>) -> Self {
        Self {
            cwd,
            vars,
            history: Vec::new(),
            last_status: 0,
        }
    }

    /// 从当前进程的工作目录和环境变量创建
    pub fn from_env() -> io::Result<Self> {
        let vars = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Ok(Self::new(env::current_dir()?, vars))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// 供词法分析展开 `$NAME` 使用，`$?` 为上一次的退出码
    pub fn lookup(&self, name: &str) -> Option<String> {
        if name == "?" {
            return Some(self.last_status.to_string());
        }
        self.get(name).map(str::to_string)
    }

    pub fn home(&self) -> Option<PathBuf> {
        self.get("HOME").filter(|h| !h.is_empty()).map(PathBuf::from)
    }

    /// 相对路径按会话的工作目录解析
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(path)
    }

    /// PATH 中按顺序排列的目录，跳过空项
    pub fn search_path(&self) -> Vec<PathBuf> {
        match self.vars.get("PATH") {
            Some(path) => env::split_paths(path)
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| self.resolve_path(dir))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn add_history(&mut self, line: impl Into<String>) {
        self.history.push(line.into());
    }

    pub fn extend_history(&mut self, lines: impl IntoIterator<Item = String>) {
        self.history.extend(lines);
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    pub fn set_last_status(&mut self, status: i32) {
        self.last_status = status;
    }

    /// 应用内建命令的副作用；返回 Some(code) 表示会话应当退出
    pub fn apply(&mut self, effect: SessionEffect) -> Option<i32> {
        match effect {
            SessionEffect::ChangeDir(dir) => {
                debug!("切换工作目录: {} -> {}", self.cwd.display(), dir.display());
                let previous = std::mem::replace(&mut self.cwd, dir);
                self.set("OLDPWD", previous.to_string_lossy());
                let current = self.cwd.to_string_lossy().into_owned();
                self.set("PWD", current);
                None
            }
            SessionEffect::Exit(code) => Some(code),
        }
    }
}
