mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use grabbox::config::Config;
use std::path::PathBuf;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    grabbox::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let mut config = load_config(args.config)?;
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            grabbox::api::run(config).await?;
        }
        Commands::Config(args) => {
            let config = load_config(args.config)?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config, AnyError> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}
