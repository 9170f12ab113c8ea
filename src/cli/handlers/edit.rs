// In-place edits of one definition: value, enabled flag, comment.

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::mutation::Command,
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Sets the raw value of a variable.")]
struct SetArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,

    /// The new raw value. Quotes and backslashes are rejected.
    value: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Enables or disables a variable.")]
struct ToggleArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Sets or clears the comment of a variable.")]
struct CommentArgs {
    /// `KEY` (the winning definition) or `SCOPE/KEY`.
    variable: String,

    /// The comment. Omit it to clear the comment.
    text: Option<String>,
}

pub fn handle_set(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let set_args: SetArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &set_args.variable)?;
    commons::commit(
        &mut session,
        Command::SetValue {
            id,
            value: set_args.value,
        },
    )?;
    Ok(())
}

fn toggle(invocation: &Invocation, args: Vec<String>, enabled: bool) -> Result<()> {
    let toggle_args: ToggleArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &toggle_args.variable)?;
    commons::commit(&mut session, Command::SetEnabled { id, enabled })?;
    Ok(())
}

pub fn handle_enable(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    toggle(invocation, args, true)
}

/// Disabled variables are left out of the saved file.
pub fn handle_disable(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    toggle(invocation, args, false)
}

pub fn handle_comment(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let comment_args: CommentArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;
    let id = commons::resolve_variable(&session, &comment_args.variable)?;
    commons::commit(
        &mut session,
        Command::SetComment {
            id,
            comment: comment_args.text.unwrap_or_default(),
        },
    )?;
    Ok(())
}
