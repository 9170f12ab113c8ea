use anyhow::Result;
use clap::Parser;
use colored::*;
use serde::Serialize;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::applicability::is_applicable,
    models::ScopeKind,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the scopes in loading order with their priorities."
)]
struct ScopesArgs {
    /// Print the list as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct ScopeRow<'a> {
    position: usize,
    name: &'a str,
    kind: ScopeKind,
    priority: f64,
    builtin: bool,
    draggable: bool,
    applicable: bool,
    variables: usize,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let scopes_args: ScopesArgs = commons::parse_args(&args)?;
    let (session, _) = commons::open_session(invocation)?;
    let model = session.model();

    let rows: Vec<ScopeRow<'_>> = model
        .catalog()
        .loading_order()
        .into_iter()
        .enumerate()
        .map(|(position, scope)| ScopeRow {
            position,
            name: &scope.name,
            kind: scope.kind,
            priority: scope.priority,
            builtin: scope.builtin,
            draggable: scope.draggable,
            applicable: is_applicable(&scope.id(), session.context()),
            variables: model.store().scope(&scope.id()).len(),
        })
        .collect();

    if scopes_args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{}",
        format!(t!("scopes.header"), context = session.context()).bold()
    );
    for row in rows {
        let name = if row.applicable {
            row.name.normal()
        } else {
            row.name.dimmed()
        };
        let origin = if row.builtin {
            t!("scopes.label.builtin").dimmed()
        } else {
            t!("scopes.label.user").cyan()
        };
        println!(
            "{:>3}. {:>8}  {:<6} {:<32} {:>3}  {}",
            row.position,
            row.priority,
            commons::kind_label(row.kind),
            name,
            row.variables,
            origin
        );
    }
    Ok(())
}
