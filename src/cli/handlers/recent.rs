use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::Path;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::{
        paths,
        recent::{self, RecentProjects},
    },
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists recently opened projects.")]
struct RecentArgs {
    /// Remove a project from the list.
    #[arg(long, value_name = "PATH")]
    forget: Option<String>,
}

pub fn handle(_invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let recent_args: RecentArgs = commons::parse_args(&args)?;
    let recent_path = paths::get_recent_projects_path()?;
    let mut projects: RecentProjects = recent::load_recent_from(&recent_path)?;

    if let Some(path) = recent_args.forget {
        if projects.forget(Path::new(&path)) {
            recent::save_recent_to(&recent_path, &projects)?;
            println!("{}", format!(t!("recent.info.forgotten"), path = path).green());
        } else {
            println!("{}", format!(t!("recent.info.not_listed"), path = path).yellow());
        }
        return Ok(());
    }

    if projects.is_empty() {
        println!("{}", t!("recent.info.empty").dimmed());
        return Ok(());
    }
    for (index, path) in projects.paths().enumerate() {
        let missing = if path.is_dir() {
            "".normal()
        } else {
            t!("recent.label.missing").red()
        };
        println!(
            "{:>2}. {:<28} {} {}",
            index + 1,
            paths::short_display(&path).bold(),
            path.display().to_string().dimmed(),
            missing
        );
    }
    Ok(())
}
