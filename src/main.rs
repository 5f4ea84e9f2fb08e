use log::{debug, error};
use std::env;
use std::error::Error;
use std::io::Write;
use std::process;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn run() -> Result<i32, Box<dyn Error>> {
    let config = Config::new()?;
    init_logger(&config)?;
    debug!("配置加载成功 {}", config.config_dir.display());

    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => Shell::new(&config)?.run(),
        [flag, line] if flag == "-c" => shell::run_command(line),
        _ => Err("usage: pipesh [-c <line>]".into()),
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            error!("pipesh 异常退出: {}", err);
            eprintln!("pipesh: {}", err);
            1
        }
    };
    let _ = std::io::stdout().flush();
    process::exit(code);
}
