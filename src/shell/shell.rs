use log::{debug, error, warn};
use std::env;
use std::error::Error;
use std::io::Write;

use crate::shell::error::ShellError;
use crate::shell::executor::{Endpoint, ExecutionResult, Executor};
use crate::shell::history::HistoryFile;
use crate::shell::parser::{parse, tokenize};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::session::Session;
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, Theme};

pub struct Shell {
    session: Session,
    theme: Theme,
    readline: ReadlineManager,
    history: HistoryFile,
}

impl Shell {
    pub fn new(config: &Config) -> Result<Self, Box<dyn Error>> {
        let mut session = Session::from_env()?;
        let history = HistoryFile::new(&config.history_file);
        let previous = history.load().unwrap_or_else(|e| {
            warn!("读取历史记录失败 {}: {}", history.path().display(), e);
            Vec::new()
        });

        let mut readline = ReadlineManager::new(config, session.search_path())?;
        readline.seed_history(&previous);
        session.extend_history(previous);

        Ok(Self {
            session,
            theme: load_theme(&config.theme),
            readline,
            history,
        })
    }

    /// 交互循环，返回 shell 的退出码
    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!("初始化 pipesh...");

        if let Err(e) = signals::ignore_interactive_signals() {
            warn!("安装信号处理函数失败: {}", e);
        }

        println!("{}", (self.theme.success_style)(self.theme.welcome_message.clone()));
        debug!("pipesh 准备就绪...");

        loop {
            std::io::stdout().flush()?;
            let prompt = self.theme.prompt(self.session.cwd());

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    if let Some(code) = self.handle_input(&line) {
                        debug!("退出 pipesh, 退出码 {}", code);
                        println!("{}", (self.theme.success_style)(self.theme.exit_message.clone()));
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("接收到 EOF 信号，退出 pipesh...");
                    println!("\n{}", (self.theme.warning_style)(self.theme.exit_message.clone()));
                    return Ok(self.session.last_status());
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号...");
                    println!("{}", (self.theme.warning_style)(self.theme.interrupt_message.clone()));
                    self.session.set_last_status(130);
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    return Err(err.into());
                }
            }
        }
    }

    fn handle_input(&mut self, line: &str) -> Option<i32> {
        if line.trim().is_empty() {
            return None;
        }
        self.record_history(line);

        let exit = execute_line(&mut self.session, line, Endpoint::Inherit, Endpoint::Inherit);
        self.sync_cwd();

        let status = self.session.last_status();
        if exit.is_none() && status != 0 {
            eprintln!("{}", self.theme.error_marker(status));
        }
        exit
    }

    fn record_history(&mut self, line: &str) {
        self.session.add_history(line);
        if let Err(e) = self.history.append(line) {
            warn!("写入历史记录失败 {}: {}", self.history.path().display(), e);
        }
        if let Err(e) = self.readline.add_history(line) {
            warn!("添加编辑器历史记录失败: {}", e);
        }
    }

    /// 文件名补全使用进程的工作目录，需要与会话保持一致
    fn sync_cwd(&self) {
        let cwd = self.session.cwd();
        if env::current_dir().ok().as_deref() != Some(cwd) {
            if let Err(e) = env::set_current_dir(cwd) {
                warn!("同步工作目录失败 {}: {}", cwd.display(), e);
            }
        }
    }
}

/// `pipesh -c <line>`：非交互地执行一行并返回其退出码
pub fn run_command(line: &str) -> Result<i32, Box<dyn Error>> {
    let mut session = Session::from_env()?;
    let exit = execute_line(&mut session, line, Endpoint::Inherit, Endpoint::Inherit);
    Ok(exit.unwrap_or_else(|| session.last_status()))
}

fn run_pipeline(
    executor: &Executor<'_>,
    session: &Session,
    line: &str,
) -> Result<Option<ExecutionResult>, ShellError> {
    let tokens = tokenize(line, &|name: &str| session.lookup(name))?;
    debug!("词法分析结果: {:?}", tokens);
    let pipeline = parse(tokens)?;
    executor.execute(&pipeline)
}

/// 分析并执行一行输入，更新会话的退出码并应用最后阶段的副作用
///
/// 返回 Some(code) 表示会话应当以该退出码结束。
pub fn execute_line(
    session: &mut Session,
    line: &str,
    stdout: Endpoint,
    stderr: Endpoint,
) -> Option<i32> {
    let outcome = {
        let snapshot: &Session = session;
        let executor = Executor::new(snapshot).stdout(stdout).stderr(stderr);
        let outcome = run_pipeline(&executor, snapshot, line);
        if let Err(err) = &outcome {
            warn!("管道未能启动: {}", err);
            executor.report(err);
        }
        outcome
    };

    match outcome {
        Ok(None) => None,
        Ok(Some(result)) => {
            session.set_last_status(result.status());
            result.effect.and_then(|effect| session.apply(effect))
        }
        Err(err) => {
            session.set_last_status(err.status());
            None
        }
    }
}
