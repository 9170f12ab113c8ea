use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::unify,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Shows one variable: its winning definition and every scope that shadows it."
)]
struct ShowArgs {
    /// The variable name.
    key: String,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let show_args: ShowArgs = commons::parse_args(&args)?;
    let (session, _) = commons::open_session(invocation)?;
    let model = session.model();

    let winner = model
        .find_effective(&show_args.key)
        .ok_or_else(|| anyhow!(t!("error.unknown_variable"), name = show_args.key))?;

    println!("{} {}", winner.key.bold(), winner.raw_value);
    if !winner.comment.is_empty() {
        println!("  {}", format!("# {}", winner.comment).dimmed());
    }
    if !winner.enabled {
        println!("  {}", t!("list.label.disabled").yellow());
    }
    if !winner.editable {
        println!("  {}", t!("show.label.read_only").yellow());
    }

    println!("\n{}", t!("show.header.definitions").bold());
    for (index, (scope, value)) in unify::definitions_of(model.catalog(), model.store(), &winner.key)
        .into_iter()
        .enumerate()
    {
        let marker = if index == 0 { "*".green() } else { " ".normal() };
        let line = format!("{} {:<28} {}", marker, scope.to_string(), value);
        if index == 0 {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
    Ok(())
}
