use std::path::PathBuf;

use log::debug;

use super::builtins::Builtin;
use crate::shell::error::ShellError;
use crate::shell::session::Session;
use crate::utils::path::{find_file_in_path, is_executable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Builtin(Builtin),
    External(PathBuf),
}

/// 决定一个阶段是内建命令还是外部程序
///
/// 含有 `/` 的名字按工作目录解析且不查 PATH，否则按 PATH 顺序查找第一个可执行文件。
pub fn resolve(name: &str, session: &Session) -> Result<Resolved, ShellError> {
    if let Some(builtin) = Builtin::lookup(name) {
        return Ok(Resolved::Builtin(builtin));
    }

    let found = if name.contains('/') {
        Some(session.resolve_path(name)).filter(|path| is_executable(path))
    } else {
        find_file_in_path(name, &session.search_path())
    };

    match found {
        Some(path) => {
            debug!("解析外部命令: {} -> {}", name, path.display());
            Ok(Resolved::External(path))
        }
        None => Err(ShellError::CommandNotFound(name.to_string())),
    }
}
