use super::args::{Cli, Commands, ConfigCommand};
use super::handlers;
use anyhow::Result;
use dapflow_runtime::{DebugConfig, resolve_config_path};

pub fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    tracing::debug!(path = %config_path.display(), "resolved config path");

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommand::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
            ConfigCommand::Show { format } => {
                let config = DebugConfig::load_from(&config_path)?;
                handlers::config::show(&config, format)
            }
        },

        Commands::Resolve {
            program,
            mode,
            name,
            cwd,
            args,
            env,
        } => {
            let config = DebugConfig::load_from(&config_path)?;
            let request = handlers::resolve::ResolveRequest {
                program,
                mode: mode.map(Into::into),
                name,
                cwd,
                args,
                env,
            };
            handlers::resolve::handle(&config, request)
        }

        Commands::Check => handlers::check::handle(&config_path),
    }
}
