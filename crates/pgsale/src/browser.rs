//! Opening the order page in a browser.

use std::process::Command;

/// The platform command that opens `url`.
pub fn command(url: &str) -> Command {
    let mut cmd = if cfg!(target_os = "linux") {
        Command::new("firefox")
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        let mut start = Command::new("cmd");
        start.args(["/C", "start"]);
        start
    };
    cmd.arg(url);
    cmd
}

/// Launch the browser and wait for it. Failures are logged, never fatal.
pub fn open(url: &str) {
    let mut cmd = command(url);
    match cmd.status() {
        Ok(status) if status.success() => tracing::debug!(url, "Browser closed"),
        Ok(status) => tracing::warn!(url, %status, "Browser exited with failure"),
        Err(e) => tracing::warn!(url, error = %e, program = ?cmd.get_program(), "Cannot launch browser"),
    }
}
