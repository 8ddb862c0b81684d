// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::CommandError;

use super::{Predicate, Transform};

/// Raw result of one shell invocation
struct Outcome {
    code: i32,
    stdout: String,
    stderr: String,
}

/// A user-supplied shell expression, run as `<shell> -c <expr>`
#[derive(Debug, Clone)]
pub struct ShellCommand {
    expr: String,
    shell: PathBuf,
}

impl ShellCommand {
    /// Create a command run by `$SHELL`, or `/bin/sh` when unset
    pub fn new(expr: impl Into<String>) -> Self {
        let shell = std::env::var_os("SHELL")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        Self::with_shell(expr, shell)
    }

    /// Create a command run by an explicit shell binary
    pub fn with_shell(expr: impl Into<String>, shell: impl Into<PathBuf>) -> Self {
        Self {
            expr: expr.into(),
            shell: shell.into(),
        }
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    async fn run(&self, input: &str, env: &[(&str, &str)]) -> Result<Outcome, CommandError> {
        let spawn_failed = |source| CommandError::SpawnFailed {
            expr: self.expr.clone(),
            source,
        };

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.expr)
            .envs(env.iter().copied())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(spawn_failed)?;

        // Commands are free to ignore their input
        if let Err(e) = fed
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(spawn_failed(e));
        }

        Ok(Outcome {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// A non-zero exit with stderr output is a command failure, anything else is a result
    fn check(&self, outcome: &Outcome) -> Result<(), CommandError> {
        if outcome.code != 0 && !outcome.stderr.is_empty() {
            return Err(CommandError::Failed {
                expr: self.expr.clone(),
                code: outcome.code,
                stderr: outcome.stderr.clone(),
            });
        }
        if !outcome.stderr.is_empty() {
            debug!(expr = %self.expr, stderr = %outcome.stderr, "hook wrote to stderr");
        }
        Ok(())
    }

    /// Run with `input` on stdin; a zero exit code is a match
    pub async fn matches(&self, input: &str) -> Result<bool, CommandError> {
        let outcome = self.run(input, &[]).await?;
        self.check(&outcome)?;
        Ok(outcome.code == 0)
    }

    /// Run with extra environment and `input` on stdin, returning trimmed stdout
    pub async fn output(&self, env: &[(&str, &str)], input: &str) -> Result<String, CommandError> {
        let outcome = self.run(input, env).await?;
        self.check(&outcome)?;
        Ok(outcome.stdout)
    }
}

#[async_trait]
impl Predicate for ShellCommand {
    async fn matches(&self, input: &str) -> Result<bool, CommandError> {
        ShellCommand::matches(self, input).await
    }
}

#[async_trait]
impl Transform for ShellCommand {
    async fn transform(&self, input: &str, env: &[(&str, &str)]) -> Result<String, CommandError> {
        self.output(env, input).await
    }
}
