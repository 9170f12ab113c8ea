// src/cli/handlers/rename.rs

use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::Command,
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Renames a variable within its scope.")]
struct RenameArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,

    /// The new name.
    new_name: String,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    // 1. Parse arguments and resolve the definition.
    let rename_args: RenameArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &rename_args.variable)?;

    // 2. Renaming to the same name is a no-op.
    if id.name == rename_args.new_name.trim() {
        println!(
            "{}",
            format!(t!("rename.info.no_change"), name = id.name).yellow()
        );
        return Ok(());
    }

    // 3. Apply and save.
    commons::commit(
        &mut session,
        Command::RenameVariable {
            id,
            new_name: rename_args.new_name,
        },
    )?;
    Ok(())
}
