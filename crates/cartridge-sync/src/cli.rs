use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(about = "Cartridge sync: keep workspace cartridges mirrored to a sandbox")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload cartridges and keep the sandbox in sync until interrupted
    Watch {
        /// Workspace folders (paths or scheme://path URIs); defaults to CWD
        folders: Vec<String>,

        /// Sandbox directory receiving the uploaded cartridges
        #[arg(long)]
        sandbox: PathBuf,
    },

    /// Print the resolved cartridge set without uploading anything
    Cartridges {
        /// Workspace folders; defaults to CWD
        folders: Vec<String>,
    },

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show merged settings and the upload config (password redacted)
    Show {
        /// Workspace folders; defaults to CWD
        folders: Vec<String>,
    },
    /// Write the user settings template (~/.config/cartsync/settings.toml)
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Validate settings and the upload config
    Validate {
        /// Workspace folders; defaults to CWD
        folders: Vec<String>,
    },
}
