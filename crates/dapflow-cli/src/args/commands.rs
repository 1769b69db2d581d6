use clap::{Subcommand, ValueEnum};
use dapflow_types::LaunchMode;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show or locate the configuration file")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    #[command(about = "Print the launch configuration a program would start with")]
    Resolve {
        #[arg(long, help = "Program to debug")]
        program: Option<PathBuf>,

        #[arg(long, help = "Runtime template (inferred from the extension when omitted)")]
        mode: Option<ModeArg>,

        #[arg(long, help = "Registered launch configuration to start from")]
        name: Option<String>,

        #[arg(long, help = "Working directory override")]
        cwd: Option<PathBuf>,

        #[arg(long = "arg", help = "Extra program argument (repeatable)")]
        args: Vec<String>,

        #[arg(long = "env", value_name = "KEY=VALUE", help = "Extra environment variable (repeatable)")]
        env: Vec<String>,
    },

    #[command(about = "Validate the configuration file")]
    Check,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print the effective configuration (defaults filled in)")]
    Show {
        #[arg(long, default_value = "toml")]
        format: ConfigFormat,
    },

    #[command(about = "Print the resolved configuration file path")]
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Python,
    Pytest,
    Node,
    #[value(name = "typescript")]
    TypeScript,
}

impl From<ModeArg> for LaunchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Python => LaunchMode::Python,
            ModeArg::Pytest => LaunchMode::Pytest,
            ModeArg::Node => LaunchMode::Node,
            ModeArg::TypeScript => LaunchMode::TypeScript,
        }
    }
}
