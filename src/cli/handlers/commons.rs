// src/cli/handlers/commons.rs

// Shared plumbing for the handlers: opening the session, resolving names, saving.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, error::ErrorKind};
use colored::{ColoredString, Colorize};
use std::env;
use std::path::{Path, PathBuf};

use crate::{
    core::{
        mutation::{Command, Event},
        paths, recent,
    },
    models::{ScopeId, ScopeKind, Settings, VariableId},
    state::{Applied, Session},
    system::{facts::HostFacts, settings},
};

/// What every handler gets from the top-level command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub project: Option<String>,
}

impl Invocation {
    /// The canonical project directory (`-C`, or the current directory).
    pub fn project_root(&self) -> Result<PathBuf> {
        let cwd = env::current_dir().context(t!("error.no_cwd"))?;
        let input = self.project.as_deref().unwrap_or(".");
        Ok(paths::resolve_project_path(input, &cwd)?)
    }
}

/// Parses handler arguments; `--help` prints and exits like a top-level command.
pub fn parse_args<T: Parser>(args: &[String]) -> Result<T> {
    match T::try_parse_from(args) {
        Ok(parsed) => Ok(parsed),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => Err(e.into()),
    }
}

pub fn load_settings() -> Settings {
    settings::load_settings().unwrap_or_else(|e| {
        log::warn!("Using default settings: {}", e);
        Settings::default()
    })
}

/// Loads the project, printing parse warnings and the substitution report.
pub fn open_session(invocation: &Invocation) -> Result<(Session, Settings)> {
    let root = invocation.project_root()?;
    let settings = load_settings();
    let facts = HostFacts::new(settings.editor.use_mulle_env, &root);

    let session = Session::open(&root, &facts, &settings.editor.default_scope)
        .with_context(|| format!(t!("error.open_failed"), path = root.display()))?;
    report_load(&session);
    Ok((session, settings))
}

fn report_load(session: &Session) {
    for warning in session.warnings() {
        eprintln!("{}: {}", t!("common.warning").yellow(), warning);
    }

    let report = session.unsafe_report();
    if report.is_empty() {
        return;
    }
    eprintln!(
        "{}",
        format!(t!("load.unsafe_header"), count = report.count).yellow()
    );
    for name in &report.names {
        eprintln!("  - {}", name);
    }
    if report.count > report.names.len() {
        eprintln!(
            "  {}",
            format!(t!("load.unsafe_more"), count = report.count - report.names.len()).dimmed()
        );
    }
}

pub fn parse_scope(input: &str) -> Result<ScopeId> {
    input
        .parse::<ScopeId>()
        .map_err(|reason| anyhow!(t!("error.invalid_scope"), input = input, reason = reason))
}

/// `KEY` names the definition that currently wins; `SCOPE/KEY` names one exactly.
pub fn resolve_variable(session: &Session, reference: &str) -> Result<VariableId> {
    if let Some((scope, name)) = reference.rsplit_once('/') {
        return Ok(VariableId::new(parse_scope(scope)?, name.trim()));
    }
    session
        .model()
        .find_effective(reference.trim())
        .map(|v| v.id())
        .ok_or_else(|| anyhow!(t!("error.unknown_variable"), name = reference))
}

/// Applies one command, reports what happened, and saves if anything changed.
pub fn commit(session: &mut Session, command: Command) -> Result<Vec<Event>> {
    let events = match session.apply(command)? {
        Applied::Done(events) => events,
        Applied::Queued { .. } => return Err(anyhow!(t!("error.save_in_flight"))),
    };
    for event in &events {
        println!("{}", describe_event(event));
    }

    if session.needs_saving() {
        let outcome = session.save()?;
        let report = outcome
            .result
            .with_context(|| format!(t!("error.save_failed"), path = session.project_root().display()))?;
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
        remember(session.project_root());
    }
    Ok(events)
}

/// Records a project in the recent list. Failures only get logged.
pub fn remember(root: &Path) {
    if let Err(e) = recent::remember(root) {
        log::warn!("Could not update recent projects: {}", e);
    }
}

pub fn kind_label(kind: ScopeKind) -> ColoredString {
    match kind {
        ScopeKind::Etc => kind.as_str().green(),
        ScopeKind::Share => kind.as_str().blue(),
        ScopeKind::System => kind.as_str().magenta(),
    }
}

pub fn describe_event(event: &Event) -> String {
    match event {
        Event::VariableAdded(id) => format!(t!("event.variable_added"), id = id.to_string().cyan()),
        Event::VariableRemoved(id) => format!(t!("event.variable_removed"), id = id.to_string().cyan()),
        Event::VariableRenamed { from, to } => format!(
            t!("event.variable_renamed"),
            from = from.to_string().cyan(),
            to = to.to_string().cyan()
        ),
        Event::VariableUpdated(id) => format!(t!("event.variable_updated"), id = id.to_string().cyan()),
        Event::VariableMoved { from, to } => format!(
            t!("event.variable_moved"),
            from = from.to_string().cyan(),
            to = to.to_string().cyan()
        ),
        Event::ScopeAdded { scope, priority } => format!(
            t!("event.scope_added"),
            scope = scope.to_string().cyan(),
            priority = priority
        ),
        Event::ScopeDeleted {
            scope,
            removed_variables,
        } => format!(
            t!("event.scope_deleted"),
            scope = scope.to_string().cyan(),
            count = removed_variables
        ),
        Event::ScopeReordered { scope, from, to } => format!(
            t!("event.scope_reordered"),
            scope = scope.to_string().cyan(),
            from = from,
            to = to
        ),
        Event::NotEditable(id) => format!(t!("event.not_editable"), id = id).yellow().to_string(),
        Event::CommandSubstitution(id) => {
            format!(t!("event.command_substitution"), id = id).yellow().to_string()
        }
    }
}
