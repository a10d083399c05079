use std::sync::Arc;

use clap::Parser;

use sl_gateway::cli::{Cli, Command, ConfigCommand};
use sl_gateway::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let (config, _) = sl_gateway::cli::load_config()?;
            let tracer_provider = telemetry::init_server(&config.observability);
            server::run(Arc::new(config), tracer_provider).await
        }
        Some(Command::Ports { json }) => {
            telemetry::init_cli();
            let (config, _) = sl_gateway::cli::load_config()?;
            sl_gateway::cli::ports::list(&config, json)
        }
        Some(Command::Doctor) => {
            telemetry::init_cli();
            let (config, config_path) = sl_gateway::cli::load_config()?;
            if !sl_gateway::cli::doctor::run(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = sl_gateway::cli::load_config()?;
            if !sl_gateway::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = sl_gateway::cli::load_config()?;
            sl_gateway::cli::config::show(&config)
        }
        Some(Command::Version) => {
            println!("seriallog {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
