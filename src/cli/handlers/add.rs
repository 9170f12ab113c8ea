use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::Command,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Adds a variable to an editable scope (the default scope unless --scope is given)."
)]
struct AddArgs {
    /// Variable name. Omit it to get a placeholder (`KEY`, `KEY_2`, ...).
    name: Option<String>,

    /// Raw, unexpanded value.
    value: Option<String>,

    /// Target scope, e.g. `project` or `etc:host-box`.
    #[arg(short, long)]
    scope: Option<String>,

    /// Comment written above the export line.
    #[arg(short, long, default_value = "")]
    comment: String,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let add_args: AddArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;

    let scope = add_args.scope.as_deref().map(commons::parse_scope).transpose()?;
    commons::commit(
        &mut session,
        Command::AddVariable {
            name: add_args.name,
            value: add_args.value.unwrap_or_default(),
            scope,
            comment: add_args.comment,
        },
    )?;
    Ok(())
}
