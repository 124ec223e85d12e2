//! `CommandRunner` executing through `sh -c` with stderr merged into stdout

use atk_core::{command_line, CommandOutput, CommandRunner, TransportError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs escaped command lines through the system shell
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ShellCommandRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            working_dir: None,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, TransportError> {
        if args.is_empty() {
            return Err(TransportError::InvalidRequest("empty command".to_string()));
        }

        let line = format!("{} 2>&1", command_line(args));
        debug!(command = %line, "Executing command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&line);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| TransportError::Process(format!("Failed to spawn shell: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                TransportError::Timeout(format!(
                    "Command timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| TransportError::Process(format!("Command failed: {}", e)))?;

        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: merged,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_merges_stderr() {
        let runner = ShellCommandRunner::new(10);
        let output = runner
            .run(&args(&["ls", "/definitely/not/here"]))
            .await
            .unwrap();
        assert!(!output.success());
        assert!(!output.output.is_empty());
    }

    #[tokio::test]
    async fn test_arguments_are_not_interpreted() {
        let runner = ShellCommandRunner::new(10);
        let output = runner.run(&args(&["echo", "$HOME; echo pwned"])).await.unwrap();
        assert!(output.success());
        assert_eq!(output.output.trim(), "$HOME; echo pwned");
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let runner = ShellCommandRunner::new(10).with_working_dir(dir.path());
        let output = runner.run(&args(&["ls"])).await.unwrap();
        assert!(output.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let runner = ShellCommandRunner::new(10);
        assert!(runner.run(&[]).await.is_err());
    }
}
