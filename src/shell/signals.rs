use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

extern "C" fn on_interrupt(_: libc::c_int) {}

/// 让 Ctrl-C / Ctrl-\ 只终止前台子进程而不终止 shell
///
/// SIG_IGN 会被 exec 出的子进程继承，处理函数在 exec 时恢复默认。
pub fn ignore_interactive_signals() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGQUIT] {
        // SAFETY: 处理函数为空，不访问任何共享状态
        unsafe { sigaction(signal, &action)? };
    }
    debug!("已安装交互信号处理函数");
    Ok(())
}
