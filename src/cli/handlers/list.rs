use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::applicability::is_applicable,
    models::{EffectiveVariable, ScopeKind},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the effective variables in loading order."
)]
struct ListArgs {
    /// Only variables whose winning definition lives in this scope (e.g. `global`, `share:plugin`).
    #[arg(long)]
    scope: Option<String>,

    /// Hide the read-only `system` scope.
    #[arg(long)]
    no_system: bool,

    /// Print the list as JSON.
    #[arg(long)]
    json: bool,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let list_args: ListArgs = commons::parse_args(&args)?;
    let (session, _) = commons::open_session(invocation)?;

    // 1. Narrow the effective list.
    let scope_filter = list_args.scope.as_deref().map(commons::parse_scope).transpose()?;
    let selected: Vec<&EffectiveVariable> = session
        .model()
        .effective()
        .iter()
        .filter(|v| scope_filter.as_ref().is_none_or(|s| v.scope_id() == *s))
        .filter(|v| !(list_args.no_system && v.kind == ScopeKind::System))
        .collect();

    // 2. Render.
    if list_args.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    if selected.is_empty() {
        println!("{}", t!("list.info.empty").dimmed());
        return Ok(());
    }

    let width = selected.iter().map(|v| v.key.len()).max().unwrap_or(0);
    for var in selected {
        let applies = is_applicable(&var.scope_id(), session.context());
        let key = format!("{:<width$}", var.key, width = width);
        let key = if !var.enabled || !applies {
            key.dimmed()
        } else if var.editable {
            key.bold()
        } else {
            key.normal()
        };
        let mut line = format!(
            "{}  {}  {}",
            key,
            var.raw_value,
            format!("[{}:{}]", commons::kind_label(var.kind), var.scope).dimmed()
        );
        if !var.enabled {
            line.push_str(&format!(" {}", t!("list.label.disabled").yellow()));
        }
        if !applies {
            line.push_str(&format!(" {}", t!("list.label.inapplicable").yellow()));
        }
        println!("{}", line);
    }
    Ok(())
}
