// src/system/executor.rs

use crate::core::evaluator::{SandboxError, ShellSandbox, build_eval_script};
use crate::core::unify::has_command_substitution;
use crate::models::EvaluatorSettings;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command as TokioCommand;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero error code.")]
    NonZeroExitStatus(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Splits a command line into program and arguments.
fn split_command_line(command_line: &str) -> Result<(String, Vec<String>), ExecutionError> {
    let trimmed = command_line.trim();
    let mut parts = shlex::split(trimmed)
        .ok_or_else(|| ExecutionError::CommandParse(trimmed.to_string()))?
        .into_iter();
    let program = parts.next().ok_or(ExecutionError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Runs a short command and returns its trimmed standard output.
/// Stderr is discarded; callers treat any failure as "not available".
pub fn capture_output(command_line: &str, cwd: &Path) -> Result<String, ExecutionError> {
    let (program, args) = split_command_line(command_line)?;
    let output = StdCommand::new(&program)
        .args(&args)
        .current_dir(dunce::simplified(cwd))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| ExecutionError::CommandFailed(command_line.to_string(), e))?;

    if !output.status.success() {
        return Err(ExecutionError::NonZeroExitStatus(command_line.to_string()));
    }
    let stdout = String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: command_line.to_string(),
        source: e,
    })?;
    Ok(stdout.trim().to_string())
}

/// Evaluates scripts in a child shell with a cleared environment.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    program: String,
    args: Vec<String>,
    passthrough: Vec<(String, String)>,
    timeout: Duration,
}

impl ProcessSandbox {
    pub fn from_settings(settings: &EvaluatorSettings) -> Result<Self, SandboxError> {
        let (program, args) = split_command_line(&settings.shell)
            .map_err(|_| SandboxError::InvalidShell(settings.shell.clone()))?;
        // Only the listed host variables survive into the sandbox.
        let passthrough = settings
            .passthrough_env
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
            .collect();
        Ok(Self {
            program,
            args,
            passthrough,
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        })
    }
}

impl ShellSandbox for ProcessSandbox {
    async fn run_shell_eval(
        &self,
        env: &[(String, String)],
        candidate: &str,
        working_dir: &Path,
    ) -> Result<String, SandboxError> {
        if has_command_substitution(candidate) || env.iter().any(|(_, v)| has_command_substitution(v)) {
            return Err(SandboxError::Refused);
        }

        let script = build_eval_script(env, candidate);
        log::debug!("Evaluation script:\n{}", script);

        let mut command = TokioCommand::new(&self.program);
        command
            .args(&self.args)
            .arg("-c")
            .arg(&script)
            .current_dir(dunce::simplified(working_dir))
            .env_clear()
            .envs(self.passthrough.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| SandboxError::Timeout(self.timeout))?
            .map_err(|source| SandboxError::Spawn {
                shell: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SandboxError::NonZeroExit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}
