use clap::Parser;
use tracing_subscriber::EnvFilter;

use ds_cli::cli::{Cli, Command, ConfigCommand};
use ds_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            path,
            json,
            chunk_size,
        } => {
            let (config, _) = ds_cli::cli::load_config()?;
            init_tracing(&config.observability);
            ds_cli::cli::replay::run(&config, &path, json, chunk_size).await
        }
        Command::Ask {
            message,
            session,
            parent,
            json,
        } => {
            let (config, _) = ds_cli::cli::load_config()?;
            init_tracing(&config.observability);
            let ok = ds_cli::cli::ask::run(&config, message, session, parent, json).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = ds_cli::cli::load_config()?;
            let valid = ds_cli::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = ds_cli::cli::load_config()?;
            print!("{}", ds_cli::cli::config::show(&config)?);
            Ok(())
        }
        Command::Version => {
            println!("deepsearch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing on stderr: compact text by default, one JSON object
/// per event with `json_logs = true`.  `RUST_LOG` overrides the configured
/// filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    if obs.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
