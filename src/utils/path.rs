use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs::{self, read_dir};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::error;

pub fn basename(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return path.into();
    }
    match trimmed.rsplit('/').next() {
        Some(p) => p.into(),
        None => trimmed.into(),
    }
}

/// 普通文件且至少有一个执行位
pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// 在给定目录中按顺序查找可执行文件，第一个命中的生效
pub fn find_file_in_path(filename: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    if filename.is_empty() {
        return None;
    }
    dirs.iter()
        .map(|dir| dir.join(filename))
        .find(|candidate| is_executable(candidate))
}

/// 列出所有以 prefix 开头的可执行文件名，补全使用
pub fn executables_with_prefix(prefix: &str, dirs: &[PathBuf]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in dirs {
        let list = match read_dir(dir) {
            Ok(list) => list,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    error!("pipesh: fs read_dir error: {}: {}", dir.display(), e);
                }
                continue;
            }
        };
        for entry in list.flatten() {
            if let Ok(name) = entry.file_name().into_string() {
                if name.starts_with(prefix) && is_executable(&entry.path()) {
                    names.insert(name);
                }
            }
        }
    }
    names
}
