use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::env;

use crate::{
    cli::handlers::commons::{self, Invocation},
    core::persistence,
    models::RuntimeContext,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Writes the effective environment as one executable shell script."
)]
struct ExportArgs {
    /// Output file. `-` prints the script instead.
    #[arg(default_value = "-")]
    output: String,

    /// Export for another operating system.
    #[arg(long)]
    os: Option<String>,

    /// Export for another host name.
    #[arg(long)]
    host: Option<String>,

    /// Export for another user name.
    #[arg(long)]
    user: Option<String>,
}

pub fn handle(invocation: &Invocation, args: Vec<String>) -> Result<()> {
    let export_args: ExportArgs = commons::parse_args(&args)?;
    let (session, _) = commons::open_session(invocation)?;

    let base = session.context();
    let ctx = RuntimeContext::new(
        export_args.os.as_deref().unwrap_or(&base.os),
        export_args.host.as_deref().unwrap_or(&base.hostname),
        export_args.user.as_deref().unwrap_or(&base.username),
    );
    let script = persistence::render_export_script(session.model().effective(), &ctx);

    if export_args.output == "-" {
        print!("{}", script);
        return Ok(());
    }

    let cwd = env::current_dir().context(t!("error.no_cwd"))?;
    let target = cwd.join(&*shellexpand::tilde(&export_args.output));
    persistence::write_export_script(&target, &script)?;
    println!(
        "{} {}",
        t!("common.success").green(),
        format!(t!("export.success"), path = target.display())
    );
    Ok(())
}
