use std::io;

use thiserror::Error;

/// 解析与执行过程中的所有错误
#[derive(Debug, Error)]
pub enum ShellError {
    /// 词法/语法错误：未闭合的引号、悬空的管道或重定向
    #[error("syntax error: {0}")]
    Syntax(String),

    /// 重定向目标无法打开
    #[error("{path}: {source}")]
    Redirection {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// 外部进程无法启动（区别于解析阶段的 not found）
    #[error("{name}: {source}")]
    Execution {
        name: String,
        #[source]
        source: io::Error,
    },

    /// 内建命令自身的前置条件失败，例如 cd 到不存在的目录
    #[error("{name}: {message}")]
    Builtin {
        name: &'static str,
        message: String,
        status: i32,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    pub fn syntax(message: impl Into<String>) -> Self {
        ShellError::Syntax(message.into())
    }

    pub fn builtin(name: &'static str, message: impl Into<String>) -> Self {
        ShellError::Builtin {
            name,
            message: message.into(),
            status: 1,
        }
    }

    /// 对应的退出码，沿用常见 shell 约定
    pub fn status(&self) -> i32 {
        match self {
            ShellError::Syntax(_) => 2,
            ShellError::Redirection { .. } => 1,
            ShellError::CommandNotFound(_) => 127,
            ShellError::Execution { .. } => 126,
            ShellError::Builtin { status, .. } => *status,
            ShellError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_status() {
        let err = ShellError::CommandNotFound("nonexistent".to_string());
        assert_eq!(err.to_string(), "nonexistent: command not found");
        assert_eq!(err.status(), 127);

        let err = ShellError::Redirection {
            path: "/no/such/dir/out.txt".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("/no/such/dir/out.txt: "));
        assert_eq!(err.status(), 1);

        let err = ShellError::syntax("unterminated double quote");
        assert_eq!(err.to_string(), "syntax error: unterminated double quote");
        assert_eq!(err.status(), 2);
    }
}
