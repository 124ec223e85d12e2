// ATK Core - Process execution contract
//
// CLI-backed adapters describe a command as an argument vector. Runners
// escape each argument, join them into one command line, execute it with
// stderr merged into stdout, and report the exit code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// Merged output of one process execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// stdout and stderr, interleaved as the process wrote them
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Process execution collaborator
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `args[0]` with the remaining arguments
    async fn run(&self, args: &[String]) -> Result<CommandOutput, TransportError>;
}

/// Escape one argument for a POSIX shell.
///
/// Arguments made only of alphanumerics and `-_./=:,@%+` pass through untouched;
/// anything else is single-quoted with embedded quotes rewritten as `'\''`.
pub fn shell_escape(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c))
    {
        return arg.to_string();
    }

    let mut escaped = String::with_capacity(arg.len() + 2);
    escaped.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// Escape every argument and join with single spaces
pub fn command_line(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}
