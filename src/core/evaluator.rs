// src/core/evaluator.rs

//! Preview expansion of a variable's raw value.
//!
//! The value is expanded by a real shell, fed only the variables that load
//! before it. Anything that could run a command is refused before a shell is
//! ever started.

use crate::constants::{EVAL_BLOCKED_SUBSTITUTION, EVAL_BLOCKED_VALUE_QUOTES, EVAL_EMPTY};
use crate::core::applicability::is_applicable;
use crate::core::unify::{has_command_substitution, has_unsafe_chars};
use crate::models::{EffectiveVariable, RuntimeContext, ScopeKind, VariableId};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name the candidate value is bound to inside the evaluation script.
pub const EVAL_TARGET_VAR: &str = "_EVAL_TARGET";

/// System variables replaced by the context being previewed.
const CONTEXT_FACTS: &[&str] = &["MULLE_HOSTNAME", "MULLE_USERNAME", "MULLE_UNAME"];

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Refusing to evaluate input containing command substitution.")]
    Refused,
    #[error("Invalid evaluator shell '{0}'.")]
    InvalidShell(String),
    #[error("Could not start evaluator shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Evaluator shell exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },
    #[error("Evaluation did not finish within {0:?}.")]
    Timeout(Duration),
    #[error("Evaluator output is not valid UTF-8.")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Runs an evaluation script in an isolated shell.
///
/// `env` is an ordered list of assignments; implementations must not run
/// anything when a value or the candidate contains command substitution.
pub trait ShellSandbox {
    fn run_shell_eval(
        &self,
        env: &[(String, String)],
        candidate: &str,
        working_dir: &Path,
    ) -> impl Future<Output = Result<String, SandboxError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    CommandSubstitution,
    QuotesInValue,
    QuotesInVariable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Empty,
    Expanded(String),
    Blocked(BlockReason),
    Failed(String),
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str(EVAL_EMPTY),
            Self::Expanded(value) => f.write_str(value),
            Self::Blocked(BlockReason::CommandSubstitution) => f.write_str(EVAL_BLOCKED_SUBSTITUTION),
            Self::Blocked(BlockReason::QuotesInValue) => f.write_str(EVAL_BLOCKED_VALUE_QUOTES),
            Self::Blocked(BlockReason::QuotesInVariable(key)) => write!(
                f,
                "(evaluation blocked: variable {} contains quotes or backslashes)",
                key
            ),
            Self::Failed(message) => write!(f, "(evaluation error: {})", message),
        }
    }
}

/// Everything needed to evaluate one value, detached from the session.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    /// Monotonic per session; results for older sequence numbers are stale.
    pub seq: u64,
    pub target: VariableId,
    pub candidate: String,
    pub prefix: Vec<EffectiveVariable>,
    pub context: RuntimeContext,
    pub working_dir: PathBuf,
}

/// Builds the ordered environment from the prefix.
///
/// Disabled entries and entries of scopes that do not apply to `ctx` are
/// skipped. The machine facts of the system scope follow `ctx`.
pub fn build_environment(
    prefix: &[EffectiveVariable],
    ctx: &RuntimeContext,
) -> Result<Vec<(String, String)>, BlockReason> {
    let mut env = Vec::with_capacity(prefix.len());
    for var in prefix {
        if !var.enabled || !is_applicable(&var.scope_id(), ctx) {
            continue;
        }

        let value = if var.kind == ScopeKind::System && CONTEXT_FACTS.contains(&var.key.as_str()) {
            context_fact(&var.key, ctx).unwrap_or(&var.raw_value).to_string()
        } else {
            var.raw_value.clone()
        };

        if has_command_substitution(&value) {
            return Err(BlockReason::CommandSubstitution);
        }
        if has_unsafe_chars(&value) {
            return Err(BlockReason::QuotesInVariable(var.key.clone()));
        }
        env.push((var.key.clone(), value));
    }
    Ok(env)
}

fn context_fact<'a>(key: &str, ctx: &'a RuntimeContext) -> Option<&'a str> {
    match key {
        "MULLE_HOSTNAME" => Some(&ctx.hostname),
        "MULLE_USERNAME" => Some(&ctx.username),
        "MULLE_UNAME" => Some(&ctx.os),
        _ => None,
    }
}

/// Checks the candidate itself before anything else.
pub fn check_candidate(candidate: &str) -> Result<(), BlockReason> {
    if has_command_substitution(candidate) {
        return Err(BlockReason::CommandSubstitution);
    }
    if has_unsafe_chars(candidate) {
        return Err(BlockReason::QuotesInValue);
    }
    Ok(())
}

/// Renders the script handed to the sandbox shell.
///
/// Values are already known to be free of `"`, `\` and substitution, so
/// plain double quoting is enough.
pub fn build_eval_script(env: &[(String, String)], candidate: &str) -> String {
    let mut script = String::new();
    for (key, value) in env {
        script.push_str(&format!("export {}=\"{}\"\n", key, value));
    }
    script.push_str(&format!("export {}=\"{}\"\n", EVAL_TARGET_VAR, candidate));
    script.push_str(&format!("eval 'printf \"%s\" \"${{{}}}\"'\n", EVAL_TARGET_VAR));
    script
}

/// Evaluates a request. Never fails: problems become placeholder outcomes.
pub async fn evaluate<S: ShellSandbox>(sandbox: &S, request: &EvaluationRequest) -> EvaluationOutcome {
    // 1. An empty value needs no shell.
    if request.candidate.is_empty() {
        return EvaluationOutcome::Empty;
    }

    // 2. Refuse anything that could execute a command.
    if let Err(reason) = check_candidate(&request.candidate) {
        return EvaluationOutcome::Blocked(reason);
    }
    let env = match build_environment(&request.prefix, &request.context) {
        Ok(env) => env,
        Err(reason) => return EvaluationOutcome::Blocked(reason),
    };

    // 3. Hand it to the sandbox.
    log::debug!(
        "Evaluating '{}' (seq {}) with {} prefix variables",
        request.target,
        request.seq,
        env.len()
    );
    match sandbox
        .run_shell_eval(&env, &request.candidate, &request.working_dir)
        .await
    {
        Ok(output) if output.is_empty() => EvaluationOutcome::Empty,
        Ok(output) => EvaluationOutcome::Expanded(output),
        Err(e) => EvaluationOutcome::Failed(e.to_string()),
    }
}
