use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::os::fd::AsRawFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{self, Child, ExitStatus, Stdio};
use std::thread::{self, Scope, ScopedJoinHandle};

use log::{debug, error, warn};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd;

use super::builtins::{Builtin, BuiltinIo, BuiltinOutcome};
use super::dispatcher::{self, Resolved};
use super::redirect::{self, StageOutputs};
use crate::shell::error::ShellError;
use crate::shell::parser::{Command as ShellCommand, Pipeline};
use crate::shell::session::{Session, SessionEffect};

/// 一个阶段的标准流端点
#[derive(Debug)]
pub enum Endpoint {
    Inherit,
    Null,
    File(File),
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Endpoint {
    fn try_clone(&self) -> io::Result<Endpoint> {
        Ok(match self {
            Endpoint::Inherit => Endpoint::Inherit,
            Endpoint::Null => Endpoint::Null,
            Endpoint::File(file) => Endpoint::File(file.try_clone()?),
        })
    }

    fn into_stdio(self) -> Stdio {
        match self {
            Endpoint::Inherit => Stdio::inherit(),
            Endpoint::Null => Stdio::null(),
            Endpoint::File(file) => Stdio::from(file),
        }
    }

    fn into_writer(self, stream: Stream) -> Box<dyn Write> {
        match (self, stream) {
            (Endpoint::Inherit, Stream::Stdout) => Box::new(io::stdout()),
            (Endpoint::Inherit, Stream::Stderr) => Box::new(io::stderr()),
            (Endpoint::Null, _) => Box::new(io::sink()),
            (Endpoint::File(file), Stream::Stdout) => Box::new(BufWriter::new(file)),
            (Endpoint::File(file), Stream::Stderr) => Box::new(file),
        }
    }
}

struct StageIo {
    stdin: Endpoint,
    stdout: Endpoint,
    stderr: Endpoint,
}

/// 已完成解析、可以启动的阶段
struct Stage<'p> {
    command: &'p ShellCommand,
    resolved: Resolved,
    outputs: StageOutputs,
}

enum StageHandle<'scope> {
    Builtin(ScopedJoinHandle<'scope, BuiltinOutcome>),
    External(Child),
    Failed(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// 按阶段位置排列的退出码
    pub statuses: Vec<i32>,
    /// 最后一个阶段的内建命令请求的会话修改
    pub effect: Option<SessionEffect>,
}

impl ExecutionResult {
    /// 管道的整体退出码，即最后一个阶段的退出码
    pub fn status(&self) -> i32 {
        self.statuses.last().copied().unwrap_or_default()
    }
}

/// 创建一对读写端都带 close-on-exec 的管道，避免泄漏给其他子进程
fn pipe() -> io::Result<(File, File)> {
    let (read, write) = unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((File::from(read), File::from(write)))
}

fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => status.signal().map(|sig| 128 + sig).unwrap_or(1),
    }
}

pub struct Executor<'a> {
    session: &'a Session,
    stdin: Endpoint,
    stdout: Endpoint,
    stderr: Endpoint,
}

impl<'a> Executor<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            stdin: Endpoint::Inherit,
            stdout: Endpoint::Inherit,
            stderr: Endpoint::Inherit,
        }
    }

    pub fn stdin(mut self, endpoint: Endpoint) -> Self {
        self.stdin = endpoint;
        self
    }

    pub fn stdout(mut self, endpoint: Endpoint) -> Self {
        self.stdout = endpoint;
        self
    }

    pub fn stderr(mut self, endpoint: Endpoint) -> Self {
        self.stderr = endpoint;
        self
    }

    /// 执行整条管道；空管道返回 None
    ///
    /// 所有阶段的命令与重定向都先解析完成，任何一个失败都不会启动任何进程。
    pub fn execute(&self, pipeline: &Pipeline) -> Result<Option<ExecutionResult>, ShellError> {
        if pipeline.is_empty() {
            return Ok(None);
        }
        debug!("执行管道: {}", pipeline);

        let stages = self.prepare(pipeline)?;
        let result = self.run(stages);
        debug!("管道各阶段退出码: {:?}", result.statuses);
        Ok(Some(result))
    }

    fn prepare<'p>(&self, pipeline: &'p Pipeline) -> Result<Vec<Stage<'p>>, ShellError> {
        let resolved = pipeline
            .commands()
            .iter()
            .map(|command| dispatcher::resolve(command.program(), self.session))
            .collect::<Result<Vec<_>, _>>()?;
        // 命令全部找到后才打开重定向文件，避免失败时留下被截断的文件
        let outputs = pipeline
            .commands()
            .iter()
            .map(|command| redirect::resolve(command, self.session))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pipeline
            .commands()
            .iter()
            .zip(resolved)
            .zip(outputs)
            .map(|((command, resolved), outputs)| Stage {
                command,
                resolved,
                outputs,
            })
            .collect())
    }

    /// 按顺序启动所有阶段并等待全部结束
    fn run(&self, stages: Vec<Stage<'_>>) -> ExecutionResult {
        let count = stages.len();
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(count);
            let mut upstream: Option<File> = None;

            for (idx, mut stage) in stages.into_iter().enumerate() {
                let is_last = idx + 1 == count;

                let stdin = match upstream.take() {
                    Some(read) => Endpoint::File(read),
                    None if idx == 0 => self.clone_endpoint(&self.stdin),
                    // 上游管道没能创建，只能给空输入
                    None => Endpoint::Null,
                };
                let stdout = if is_last {
                    match stage.outputs.stdout.take() {
                        Some(file) => Endpoint::File(file),
                        None => self.clone_endpoint(&self.stdout),
                    }
                } else {
                    match pipe() {
                        Ok((read, write)) => {
                            upstream = Some(read);
                            Endpoint::File(write)
                        }
                        Err(e) => {
                            error!("创建管道失败: {}", e);
                            self.report(&ShellError::Io(e));
                            Endpoint::Null
                        }
                    }
                };
                let stderr = match stage.outputs.stderr.take() {
                    Some(file) => Endpoint::File(file),
                    None => self.clone_endpoint(&self.stderr),
                };

                handles.push(self.launch(scope, stage, StageIo { stdin, stdout, stderr }));
            }

            self.wait_all(handles)
        })
    }

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        stage: Stage<'env>,
        io: StageIo,
    ) -> StageHandle<'scope> {
        let command = stage.command;
        match stage.resolved {
            Resolved::Builtin(builtin) => {
                let session = self.session;
                let args = command.arguments();
                StageHandle::Builtin(scope.spawn(move || run_builtin(builtin, args, session, io)))
            }
            Resolved::External(path) => match spawn_external(command, &path, self.session, io) {
                Ok(child) => {
                    debug!("启动外部命令 [PID:{}]: {}", child.id(), command);
                    StageHandle::External(child)
                }
                Err(source) => {
                    let err = ShellError::Execution {
                        name: command.program().to_string(),
                        source,
                    };
                    error!("启动外部命令失败: {}", err);
                    self.report(&err);
                    StageHandle::Failed(err.status())
                }
            },
        }
    }

    /// 按位置收集退出码，与各阶段的结束顺序无关
    fn wait_all(&self, handles: Vec<StageHandle<'_>>) -> ExecutionResult {
        let last = handles.len().saturating_sub(1);
        let mut statuses = Vec::with_capacity(handles.len());
        let mut effect = None;

        for (idx, handle) in handles.into_iter().enumerate() {
            let status = match handle {
                StageHandle::Builtin(handle) => match handle.join() {
                    Ok(outcome) => {
                        if idx == last {
                            effect = outcome.effect;
                        } else if let Some(ignored) = outcome.effect {
                            debug!("忽略非最后阶段的副作用: {:?}", ignored);
                        }
                        outcome.status
                    }
                    Err(_) => {
                        error!("内建命令线程异常退出");
                        1
                    }
                },
                StageHandle::External(mut child) => match child.wait() {
                    Ok(status) => exit_code(status),
                    Err(e) => {
                        error!("等待子进程 {} 失败: {}", child.id(), e);
                        1
                    }
                },
                StageHandle::Failed(status) => status,
            };
            statuses.push(status);
        }

        ExecutionResult { statuses, effect }
    }

    fn clone_endpoint(&self, endpoint: &Endpoint) -> Endpoint {
        endpoint.try_clone().unwrap_or_else(|e| {
            warn!("复制文件描述符失败: {}", e);
            Endpoint::Null
        })
    }

    /// 错误信息写到 shell 自己的 stderr
    pub fn report(&self, err: &ShellError) {
        let message = format!("pipesh: {}\n", err);
        let written = match &self.stderr {
            Endpoint::Inherit => io::stderr().write_all(message.as_bytes()),
            Endpoint::Null => Ok(()),
            Endpoint::File(file) => {
                let mut writer: &File = file;
                writer.write_all(message.as_bytes())
            }
        };
        if let Err(e) = written {
            warn!("写入错误信息失败: {}", e);
        }
    }
}

fn spawn_external(command: &ShellCommand, path: &Path, session: &Session, io: StageIo) -> io::Result<Child> {
    // Command 在语句结束时被释放，父进程持有的管道端随之关闭
    process::Command::new(path)
        .arg0(command.program())
        .args(command.arguments())
        .env_clear()
        .envs(session.vars())
        .current_dir(session.cwd())
        .stdin(io.stdin.into_stdio())
        .stdout(io.stdout.into_stdio())
        .stderr(io.stderr.into_stdio())
        .spawn()
}

fn run_builtin(builtin: Builtin, args: &[String], session: &Session, io: StageIo) -> BuiltinOutcome {
    let StageIo { stdin, stdout, stderr } = io;
    let mut stdout = stdout.into_writer(Stream::Stdout);
    let mut stderr = stderr.into_writer(Stream::Stderr);
    let outcome = builtin.run(
        args,
        session,
        &mut BuiltinIo {
            stdout: &mut *stdout,
            stderr: &mut *stderr,
        },
    );
    // 输入端保持到命令结束再关闭，上游因此收到 EPIPE 而不是一直阻塞
    drop(stdin);
    outcome
}
