use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grabbox")]
#[command(about = "Background download job host", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (defaults to $GRABBOX_CONFIG or config/grabbox.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to $GRABBOX_CONFIG or config/grabbox.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_args() {
        let cli = Cli::try_parse_from([
            "grabbox",
            "server",
            "--address",
            "0.0.0.0:9000",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.address, Some("0.0.0.0:9000".parse().unwrap()));
                assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_command() {
        let cli = Cli::try_parse_from(["grabbox", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigArgs { config: None })));
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from(["grabbox", "server", "--address", "nope"]).is_err());
    }
}
