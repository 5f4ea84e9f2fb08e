use std::fs::{File, OpenOptions};

use log::debug;

use crate::shell::error::ShellError;
use crate::shell::parser::{Command, RedirectOp, Redirection};
use crate::shell::session::Session;

/// 一个阶段已打开的输出目标，None 表示使用默认输出
#[derive(Debug, Default)]
pub struct StageOutputs {
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

/// 在任何阶段启动之前打开该阶段的重定向文件
pub fn resolve(command: &Command, session: &Session) -> Result<StageOutputs, ShellError> {
    Ok(StageOutputs {
        stdout: command
            .stdout_target
            .as_ref()
            .map(|target| open_target(target, session))
            .transpose()?,
        stderr: command
            .stderr_target
            .as_ref()
            .map(|target| open_target(target, session))
            .transpose()?,
    })
}

fn open_target(redirection: &Redirection, session: &Session) -> Result<File, ShellError> {
    let mut options = OpenOptions::new();
    match redirection.operator {
        RedirectOp::Output | RedirectOp::Error => options.write(true).create(true).truncate(true),
        RedirectOp::Append => options.append(true).create(true),
        RedirectOp::Input => options.read(true),
    };

    let path = session.resolve_path(&redirection.filename);
    debug!("打开重定向 {} {}", redirection.operator, path.display());
    options.open(&path).map_err(|source| ShellError::Redirection {
        path: redirection.filename.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::io::Write;

    fn command(stdout: Option<(RedirectOp, &str)>, stderr: Option<&str>) -> Command {
        Command {
            argv: vec!["echo".to_string()],
            stdout_target: stdout.map(|(operator, filename)| Redirection {
                operator,
                filename: filename.to_string(),
            }),
            stderr_target: stderr.map(|filename| Redirection {
                operator: RedirectOp::Error,
                filename: filename.to_string(),
            }),
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_no_redirection() {
        let session = Session::new("/".into(), HashMap::new());
        let outputs = resolve(&command(None, None), &session).unwrap();
        assert!(outputs.stdout.is_none());
        assert!(outputs.stderr.is_none());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_truncate_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path().to_path_buf(), HashMap::new());
        fs::write(dir.path().join("out.txt"), "old contents\n").unwrap();

        let outputs = resolve(&command(Some((RedirectOp::Output, "out.txt")), None), &session).unwrap();
        outputs.stdout.unwrap().write_all(b"one\n").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "one\n");

        let outputs = resolve(&command(Some((RedirectOp::Append, "out.txt")), None), &session).unwrap();
        outputs.stdout.unwrap().write_all(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "one\ntwo\n");

        let outputs = resolve(&command(None, Some("err.txt")), &session).unwrap();
        assert!(outputs.stderr.is_some());
        assert!(dir.path().join("err.txt").exists());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path().to_path_buf(), HashMap::new());

        for target in ["missing/out.txt", "."] {
            match resolve(&command(Some((RedirectOp::Output, target)), None), &session) {
                Err(ShellError::Redirection { path, .. }) => assert_eq!(path, target),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
