use anyhow::Result;
use clap::Parser;

mod cartridges_cmd;
mod cli;
mod config_cmds;
mod config_watch;
mod console;
mod output;
mod watch_cmd;

use cartsync_core::WorkspaceFolder;
use cli::{Cli, Commands, ConfigCommands};

/// Folder arguments, or the current directory when none are given.
fn workspace_folders(args: &[String]) -> Vec<WorkspaceFolder> {
    if args.is_empty() {
        return vec![console::folder_from_arg(".")];
    }
    args.iter().map(|arg| console::folder_from_arg(arg)).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { folders, sandbox } => {
            watch_cmd::handle_watch(workspace_folders(&folders), sandbox).await?;
        }
        Commands::Cartridges { folders } => {
            cartridges_cmd::handle_cartridges(workspace_folders(&folders)).await?;
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show { folders } => {
                config_cmds::handle_config_show(workspace_folders(&folders))?;
            }
            ConfigCommands::Init { force } => {
                config_cmds::handle_config_init(force)?;
            }
            ConfigCommands::Validate { folders } => {
                config_cmds::handle_config_validate(workspace_folders(&folders))?;
            }
        },
    }

    Ok(())
}
