// src/cli/handlers/scope.rs

// Structural edits of the loading order: user scopes and their priorities.

use anyhow::{Result, anyhow};
use clap::{ArgGroup, Parser};
use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::{Command, Placement},
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Adds a user scope to the loading order.")]
struct ScopeAddArgs {
    /// Scope name (letters, digits, `_` and `-`).
    name: String,

    /// Explicit priority. Defaults to a slot right after `global`.
    #[arg(short, long)]
    priority: Option<f64>,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Deletes a user scope together with all of its variables."
)]
struct ScopeRmArgs {
    /// The scope to delete.
    scope: String,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    yes: bool,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Moves a user scope within the loading order."
)]
#[command(group(ArgGroup::new("placement").required(true).args(["index", "priority"])))]
struct ScopeMoveArgs {
    /// The scope to move.
    scope: String,

    /// Position in the loading order, not counting `system` and the scope itself.
    #[arg(short, long)]
    index: Option<usize>,

    /// Explicit priority.
    #[arg(short, long)]
    priority: Option<f64>,
}

pub fn handle_add(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let add_args: ScopeAddArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    commons::commit(
        &mut session,
        Command::AddScope {
            name: add_args.name,
            priority: add_args.priority,
        },
    )?;
    Ok(())
}

pub fn handle_remove(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    // 1. Parse arguments and resolve the scope.
    let rm_args: ScopeRmArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let scope = commons::parse_scope(&rm_args.scope)?;

    // 2. Show what goes away and confirm.
    let doomed = session.model().store().scope(&scope).len();
    if !rm_args.yes {
        println!(
            "\n{}",
            format!(t!("scope_rm.warning.header"), scope = scope, count = doomed)
                .red()
                .bold()
        );
        if !Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("scope_rm.prompt.are_you_sure"))
            .default(false)
            .interact()?
        {
            println!("\n{}", t!("common.info.operation_cancelled"));
            return Ok(());
        }
    }

    // 3. Apply and save.
    commons::commit(&mut session, Command::DeleteScope(scope))?;
    Ok(())
}

pub fn handle_move(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let move_args: ScopeMoveArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let scope = commons::parse_scope(&move_args.scope)?;

    let placement = match (move_args.index, move_args.priority) {
        (Some(index), _) => Placement::Index(index),
        (None, Some(priority)) => Placement::Priority(priority),
        (None, None) => return Err(anyhow!(t!("scope_move.error.no_placement"))),
    };
    commons::commit(&mut session, Command::ReorderScope { scope, placement })?;
    Ok(())
}
