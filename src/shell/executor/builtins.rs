use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};

use log::debug;
use nix::unistd::{access, AccessFlags};
use once_cell::sync::Lazy;

use super::dispatcher::{self, Resolved};
use crate::shell::error::ShellError;
use crate::shell::session::{Session, SessionEffect};

/// 内建命令的输出端；输入端由执行器持有到命令结束
pub struct BuiltinIo<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Exit,
    Cd,
    Pwd,
    Type,
    History,
}

static BUILTINS: Lazy<BTreeMap<&'static str, Builtin>> =
    Lazy::new(|| Builtin::ALL.iter().map(|b| (b.name(), *b)).collect());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinOutcome {
    pub status: i32,
    pub effect: Option<SessionEffect>,
}

impl BuiltinOutcome {
    pub fn status(status: i32) -> Self {
        Self {
            status,
            effect: None,
        }
    }

    fn effect(effect: SessionEffect) -> Self {
        Self {
            status: 0,
            effect: Some(effect),
        }
    }
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Echo,
        Builtin::Exit,
        Builtin::Cd,
        Builtin::Pwd,
        Builtin::Type,
        Builtin::History,
    ];

    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS.get(name).copied()
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTINS.keys().copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Echo => "echo",
            Builtin::Exit => "exit",
            Builtin::Cd => "cd",
            Builtin::Pwd => "pwd",
            Builtin::Type => "type",
            Builtin::History => "history",
        }
    }

    /// 执行内建命令，错误写入 stderr 并转换为退出码
    pub fn run(self, args: &[String], session: &Session, io: &mut BuiltinIo<'_>) -> BuiltinOutcome {
        debug!("执行内建命令: {} {:?}", self.name(), args);
        let result = match self {
            Builtin::Echo => echo(args, io),
            Builtin::Exit => exit(args),
            Builtin::Cd => cd(args, session, io),
            Builtin::Pwd => pwd(session, io),
            Builtin::Type => type_of(args, session, io),
            Builtin::History => history(args, session, io),
        };
        let result = result.and_then(|outcome| {
            io.stdout.flush()?;
            Ok(outcome)
        });

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = match err {
                    ShellError::Io(e) => ShellError::builtin(self.name(), format!("write error: {}", e)),
                    err => err,
                };
                let _ = writeln!(io.stderr, "{}", err);
                let _ = io.stderr.flush();
                BuiltinOutcome::status(err.status())
            }
        }
    }
}

fn echo(args: &[String], io: &mut BuiltinIo<'_>) -> Result<BuiltinOutcome, ShellError> {
    let (words, newline) = match args.first().map(String::as_str) {
        Some("-n") => (&args[1..], false),
        _ => (args, true),
    };
    io.stdout.write_all(words.join(" ").as_bytes())?;
    if newline {
        io.stdout.write_all(b"\n")?;
    }
    Ok(BuiltinOutcome::status(0))
}

fn exit(args: &[String]) -> Result<BuiltinOutcome, ShellError> {
    match args {
        [] => Ok(BuiltinOutcome::effect(SessionEffect::Exit(0))),
        [code] => match code.parse::<i32>() {
            Ok(code) => Ok(BuiltinOutcome::effect(SessionEffect::Exit(code.rem_euclid(256)))),
            Err(_) => Err(ShellError::Builtin {
                name: "exit",
                message: format!("{}: numeric argument required", code),
                status: 2,
            }),
        },
        _ => Err(ShellError::builtin("exit", "too many arguments")),
    }
}

fn cd(args: &[String], session: &Session, io: &mut BuiltinIo<'_>) -> Result<BuiltinOutcome, ShellError> {
    if args.len() > 1 {
        return Err(ShellError::builtin("cd", "too many arguments"));
    }

    let (target, announce) = match args.first().map(String::as_str) {
        None => match session.home() {
            Some(home) => (home.to_string_lossy().into_owned(), false),
            None => return Err(ShellError::builtin("cd", "HOME not set")),
        },
        Some("-") => match session.get("OLDPWD") {
            Some(old) => (old.to_string(), true),
            None => return Err(ShellError::builtin("cd", "OLDPWD not set")),
        },
        Some(dir) => (dir.to_string(), false),
    };

    let dir = match fs::canonicalize(session.resolve_path(&target)) {
        Ok(dir) => dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ShellError::builtin(
                "cd",
                format!("{}: No such file or directory", target),
            ))
        }
        Err(e) => return Err(ShellError::builtin("cd", format!("{}: {}", target, e))),
    };
    if !dir.is_dir() {
        return Err(ShellError::builtin("cd", format!("{}: Not a directory", target)));
    }
    if let Err(errno) = access(&dir, AccessFlags::X_OK) {
        return Err(ShellError::builtin("cd", format!("{}: {}", target, errno.desc())));
    }

    if announce {
        writeln!(io.stdout, "{}", dir.display())?;
    }
    Ok(BuiltinOutcome::effect(SessionEffect::ChangeDir(dir)))
}

fn pwd(session: &Session, io: &mut BuiltinIo<'_>) -> Result<BuiltinOutcome, ShellError> {
    writeln!(io.stdout, "{}", session.cwd().display())?;
    Ok(BuiltinOutcome::status(0))
}

fn type_of(args: &[String], session: &Session, io: &mut BuiltinIo<'_>) -> Result<BuiltinOutcome, ShellError> {
    let mut status = 0;
    for name in args {
        match dispatcher::resolve(name, session) {
            Ok(Resolved::Builtin(_)) => writeln!(io.stdout, "{} is a shell builtin", name)?,
            Ok(Resolved::External(path)) => writeln!(io.stdout, "{} is {}", name, path.display())?,
            Err(_) => {
                writeln!(io.stderr, "{}: not found", name)?;
                status = 1;
            }
        }
    }
    Ok(BuiltinOutcome::status(status))
}

fn history(args: &[String], session: &Session, io: &mut BuiltinIo<'_>) -> Result<BuiltinOutcome, ShellError> {
    let entries = session.history();
    let start = match args {
        [] => 0,
        [count] => match count.parse::<usize>() {
            Ok(count) => entries.len().saturating_sub(count),
            Err(_) => {
                return Err(ShellError::Builtin {
                    name: "history",
                    message: format!("{}: numeric argument required", count),
                    status: 2,
                })
            }
        },
        _ => return Err(ShellError::builtin("history", "too many arguments")),
    };

    for (idx, line) in entries.iter().enumerate().skip(start) {
        writeln!(io.stdout, "{:>5}  {}", idx + 1, line)?;
    }
    Ok(BuiltinOutcome::status(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn session(cwd: &Path) -> Session {
        let mut vars = HashMap::new();
        vars.insert("HOME".to_string(), "/".to_string());
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Session::new(cwd.to_path_buf(), vars)
    }

    #[allow(clippy::unwrap_used)]
    fn run(builtin: Builtin, args: &[&str], session: &Session) -> (BuiltinOutcome, String, String) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let outcome = {
            let mut io = BuiltinIo {
                stdout: &mut stdout,
                stderr: &mut stderr,
            };
            builtin.run(&args, session, &mut io)
        };
        (
            outcome,
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("echo"), Some(Builtin::Echo));
        assert_eq!(Builtin::lookup("history"), Some(Builtin::History));
        assert_eq!(Builtin::lookup("ls"), None);
        assert_eq!(Builtin::names().count(), Builtin::ALL.len());
    }

    #[test]
    fn test_echo_command() {
        let session = session(Path::new("/"));
        let (outcome, out, _) = run(Builtin::Echo, &["Hello", "World"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(0));
        assert_eq!(out, "Hello World\n");

        let (_, out, _) = run(Builtin::Echo, &[], &session);
        assert_eq!(out, "\n");

        let (_, out, _) = run(Builtin::Echo, &["-n", "a", "b"], &session);
        assert_eq!(out, "a b");
    }

    #[test]
    fn test_exit_command() {
        let session = session(Path::new("/"));
        let (outcome, _, _) = run(Builtin::Exit, &["0"], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::Exit(0)));

        let (outcome, _, _) = run(Builtin::Exit, &["127"], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::Exit(127)));

        let (outcome, _, _) = run(Builtin::Exit, &[], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::Exit(0)));

        let (outcome, _, _) = run(Builtin::Exit, &["-1"], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::Exit(255)));
    }

    #[test]
    fn test_exit_command_invalid_argument() {
        let session = session(Path::new("/"));
        let (outcome, _, err) = run(Builtin::Exit, &["invalid"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(2));
        assert_eq!(err, "exit: invalid: numeric argument required\n");

        let (outcome, _, _) = run(Builtin::Exit, &["1", "2"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(1));
    }

    #[test]
    fn test_pwd() {
        let session = session(Path::new("/tmp"));
        let (outcome, out, _) = run(Builtin::Pwd, &[], &session);
        assert_eq!(outcome.status, 0);
        assert_eq!(out, "/tmp\n");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        let session = session(&root);

        let (outcome, _, _) = run(Builtin::Cd, &["sub"], &session);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.effect, Some(SessionEffect::ChangeDir(root.join("sub"))));

        let (outcome, _, _) = run(Builtin::Cd, &[], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::ChangeDir(PathBuf::from("/"))));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_failure_leaves_session_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();
        let session = session(dir.path());

        let (outcome, _, err) = run(Builtin::Cd, &["missing"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(1));
        assert_eq!(err, "cd: missing: No such file or directory\n");

        let (outcome, _, err) = run(Builtin::Cd, &["file.txt"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(1));
        assert_eq!(err, "cd: file.txt: Not a directory\n");

        let (outcome, _, _) = run(Builtin::Cd, &["a", "b"], &session);
        assert_eq!(outcome, BuiltinOutcome::status(1));
        assert_eq!(session.cwd(), dir.path());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_dash_uses_oldpwd() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut session = session(Path::new("/"));
        session.set("OLDPWD", root.to_string_lossy());

        let (outcome, out, _) = run(Builtin::Cd, &["-"], &session);
        assert_eq!(outcome.effect, Some(SessionEffect::ChangeDir(root.clone())));
        assert_eq!(out, format!("{}\n", root.display()));
    }

    #[test]
    fn test_type_command_builtin() {
        let session = session(Path::new("/"));
        let (outcome, out, _) = run(Builtin::Type, &["echo", "exit"], &session);
        assert_eq!(outcome.status, 0);
        assert_eq!(out, "echo is a shell builtin\nexit is a shell builtin\n");
    }

    #[test]
    fn test_type_command_external() {
        let session = session(Path::new("/"));
        let (outcome, out, _) = run(Builtin::Type, &["sh"], &session);
        assert_eq!(outcome.status, 0);
        assert!(out.starts_with("sh is /"));
        assert!(out.trim_end().ends_with("/sh"));
    }

    #[test]
    fn test_type_command_not_found() {
        let session = session(Path::new("/"));
        let (outcome, out, err) = run(Builtin::Type, &["nonexistent", "pwd"], &session);
        assert_eq!(outcome.status, 1);
        assert_eq!(out, "pwd is a shell builtin\n");
        assert_eq!(err, "nonexistent: not found\n");
    }

    #[test]
    fn test_history() {
        let mut session = session(Path::new("/"));
        session.extend_history(["ls".to_string(), "pwd".to_string()]);
        session.add_history("history");

        let (outcome, out, _) = run(Builtin::History, &[], &session);
        assert_eq!(outcome.status, 0);
        assert_eq!(out, "    1  ls\n    2  pwd\n    3  history\n");

        let (_, out, _) = run(Builtin::History, &["2"], &session);
        assert_eq!(out, "    2  pwd\n    3  history\n");

        let (outcome, _, err) = run(Builtin::History, &["x"], &session);
        assert_eq!(outcome.status, 2);
        assert_eq!(err, "history: x: numeric argument required\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_write_error_is_reported() {
        let session = session(Path::new("/"));
        let mut stdout = BrokenPipe;
        let mut stderr = Vec::new();
        let outcome = {
            let mut io = BuiltinIo {
                stdout: &mut stdout,
                stderr: &mut stderr,
            };
            Builtin::Echo.run(&["hi".to_string()], &session, &mut io)
        };
        assert_eq!(outcome.status, 1);
        assert!(String::from_utf8(stderr).unwrap().starts_with("echo: write error: "));
    }
}
