// src/cli/handlers/eval.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::evaluator::{self, EvaluationOutcome},
    models::RuntimeContext,
    state::Session,
    system::executor::ProcessSandbox,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Expands variables the way a shell would, using only what loads before them."
)]
struct EvalArgs {
    /// Variables to evaluate. Defaults to every effective variable.
    keys: Vec<String>,

    /// Evaluate this value instead of the stored one (needs exactly one key).
    #[arg(long)]
    value: Option<String>,

    /// Preview with another operating system.
    #[arg(long)]
    os: Option<String>,

    /// Preview with another host name.
    #[arg(long)]
    host: Option<String>,

    /// Preview with another user name.
    #[arg(long)]
    user: Option<String>,
}

impl EvalArgs {
    /// The context to evaluate under, if any part of it was overridden.
    fn preview(&self, base: &RuntimeContext) -> Option<RuntimeContext> {
        if self.os.is_none() && self.host.is_none() && self.user.is_none() {
            return None;
        }
        Some(RuntimeContext::new(
            self.os.as_deref().unwrap_or(&base.os),
            self.host.as_deref().unwrap_or(&base.hostname),
            self.user.as_deref().unwrap_or(&base.username),
        ))
    }
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    // 1. Parse arguments and load the project.
    let eval_args: EvalArgs = commons::parse_args(&args)?;
    if eval_args.value.is_some() && eval_args.keys.len() != 1 {
        return Err(anyhow::anyhow!(t!("eval.error.value_needs_one_key")));
    }
    let (mut session, settings) = commons::open_session(invocation)?;
    let sandbox = ProcessSandbox::from_settings(&settings.evaluator)?;

    let preview = eval_args.preview(session.context());
    if let Some(ctx) = &preview {
        println!("{}", format!(t!("eval.info.preview"), context = ctx).dimmed());
    }

    let keys: Vec<String> = if eval_args.keys.is_empty() {
        session.model().effective().iter().map(|v| v.key.clone()).collect()
    } else {
        eval_args.keys.clone()
    };

    // 2. The sandbox is async; a single-threaded runtime is all it needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(t!("eval.error.runtime"))?;

    let width = keys.iter().map(String::len).max().unwrap_or(0);
    for key in &keys {
        let outcome = runtime.block_on(evaluate_one(
            &mut session,
            &sandbox,
            key,
            eval_args.value.as_deref(),
            preview.clone(),
        ))?;
        print_outcome(key, width, outcome);
    }
    Ok(())
}

async fn evaluate_one(
    session: &mut Session,
    sandbox: &ProcessSandbox,
    key: &str,
    candidate: Option<&str>,
    preview: Option<RuntimeContext>,
) -> Result<Option<EvaluationOutcome>> {
    let request = session.request_evaluation(key, candidate, preview)?;
    let outcome = evaluator::evaluate(sandbox, &request).await;
    Ok(session.accept_evaluation(&request, outcome))
}

fn print_outcome(key: &str, width: usize, outcome: Option<EvaluationOutcome>) {
    let Some(outcome) = outcome else {
        return;
    };
    let key = format!("{:<width$}", key, width = width).bold();
    match outcome {
        EvaluationOutcome::Expanded(value) => println!("{}  {}", key, value),
        EvaluationOutcome::Empty => println!("{}  {}", key, outcome.to_string().dimmed()),
        EvaluationOutcome::Blocked(_) => println!("{}  {}", key, outcome.to_string().yellow()),
        EvaluationOutcome::Failed(_) => println!("{}  {}", key, outcome.to_string().red()),
    }
}
