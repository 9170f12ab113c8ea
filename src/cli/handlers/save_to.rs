use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::{env, fs};

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::paths,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Saves the project's editable scopes into another project directory."
)]
struct SaveToArgs {
    /// Destination project directory. Created if missing.
    target: String,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    // 1. Parse arguments and load the source project.
    let save_args: SaveToArgs = commons::parse_args(&args)?;
    let (mut session, _) = commons::open_session(invocation)?;

    // 2. Make sure the destination exists before resolving it.
    let cwd = env::current_dir().context(t!("error.no_cwd"))?;
    let expanded = cwd.join(&*shellexpand::tilde(&save_args.target));
    fs::create_dir_all(&expanded)
        .with_context(|| format!(t!("save_to.error.create_failed"), path = expanded.display()))?;
    let target = paths::resolve_project_path(&save_args.target, &cwd)?;

    // 3. Save and switch over.
    let outcome = session.save_to(&target)?;
    let report = outcome
        .result
        .with_context(|| format!(t!("error.save_failed"), path = target.display()))?;

    println!(
        "{} {}",
        t!("common.success").green(),
        format!(
            t!("save.success"),
            written = report.files_written,
            removed = report.files_removed,
            path = paths::short_display(session.project_root())
        )
    );
    commons::remember(session.project_root());
    Ok(())
}
