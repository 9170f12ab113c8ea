use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::Command,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Removes a variable definition. Read-only definitions are left alone."
)]
struct RmArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    #[arg(required = true)]
    variables: Vec<String>,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let rm_args: RmArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;

    // Resolve everything first so that `rm FOO FOO` does not hit a shadowed definition.
    let ids = rm_args
        .variables
        .iter()
        .map(|reference| commons::resolve_variable(&session, reference))
        .collect::<Result<Vec<_>>>()?;

    for id in ids {
        commons::commit(&mut session, Command::DeleteVariable(id))?;
    }
    Ok(())
}
