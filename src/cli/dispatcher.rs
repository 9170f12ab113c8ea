use anyhow::{Result, anyhow};

use crate::cli::{
    Cli,
    handlers::{self, commons::Invocation},
};

/// Defines a command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(&Invocation, Vec<String>) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &[],
        handler: handlers::show::handle,
    },
    CommandDefinition {
        name: "scopes",
        aliases: &[],
        handler: handlers::scopes::handle,
    },
    CommandDefinition {
        name: "add",
        aliases: &[],
        handler: handlers::add::handle,
    },
    CommandDefinition {
        name: "set",
        aliases: &[],
        handler: handlers::edit::handle_set,
    },
    CommandDefinition {
        name: "enable",
        aliases: &[],
        handler: handlers::edit::handle_enable,
    },
    CommandDefinition {
        name: "disable",
        aliases: &[],
        handler: handlers::edit::handle_disable,
    },
    CommandDefinition {
        name: "comment",
        aliases: &[],
        handler: handlers::edit::handle_comment,
    },
    CommandDefinition {
        name: "rm",
        aliases: &["delete", "del"],
        handler: handlers::rm::handle,
    },
    CommandDefinition {
        name: "rename",
        aliases: &[],
        handler: handlers::rename::handle,
    },
    CommandDefinition {
        name: "move",
        aliases: &["mv"],
        handler: handlers::relocate::handle_move,
    },
    CommandDefinition {
        name: "copy",
        aliases: &["cp"],
        handler: handlers::relocate::handle_copy,
    },
    CommandDefinition {
        name: "scope-add",
        aliases: &[],
        handler: handlers::scope::handle_add,
    },
    CommandDefinition {
        name: "scope-rm",
        aliases: &[],
        handler: handlers::scope::handle_remove,
    },
    CommandDefinition {
        name: "scope-move",
        aliases: &[],
        handler: handlers::scope::handle_move,
    },
    CommandDefinition {
        name: "eval",
        aliases: &[],
        handler: handlers::eval::handle,
    },
    CommandDefinition {
        name: "export",
        aliases: &[],
        handler: handlers::export::handle,
    },
    CommandDefinition {
        name: "save-to",
        aliases: &[],
        handler: handlers::save_to::handle,
    },
    CommandDefinition {
        name: "recent",
        aliases: &[],
        handler: handlers::recent::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `envscope [-C DIR] <command> [args...]`. No command means `list`.
pub fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("Dispatching: {:?}", cli);

    let invocation = Invocation {
        project: cli.project,
    };
    let mut args = cli.args.into_iter();
    let command_name = args.next().unwrap_or_else(|| "list".to_string());

    let command = find_command(&command_name)
        .ok_or_else(|| anyhow!(t!("error.unknown_command"), name = command_name))?;
    (command.handler)(&invocation, args.collect())
}
