// Moving a definition to another scope, or copying it into `global`.

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::Command,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Moves a variable into another editable scope, creating that scope if needed."
)]
struct MoveArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,

    /// Destination scope.
    scope: String,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Copies a variable (typically a read-only one) into the `global` scope."
)]
struct CopyArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,
}

pub fn handle_move(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let move_args: MoveArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &move_args.variable)?;
    let to = commons::parse_scope(&move_args.scope)?;
    commons::commit(&mut session, Command::ChangeScope { id, to })?;
    Ok(())
}

pub fn handle_copy(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let copy_args: CopyArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &copy_args.variable)?;
    commons::commit(&mut session, Command::CopyToGlobal(id))?;
    Ok(())
}
