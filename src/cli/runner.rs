use anyhow::Result;
use chrono::Local;
use clap::Parser;

use super::{Cli, Commands};
use crate::config::Config;
use crate::gateway::HttpGateway;
use crate::{cli_cmds, host, init};

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Host {
            class,
            date,
            minutes,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let minutes = minutes.unwrap_or(config.session.default_validity_minutes);
            let gateway = HttpGateway::new(&config.api);
            host::run_host(gateway, &config, &class, date, minutes).await?;
        }
        Commands::Scan => {
            cli_cmds::cmd_scan(&config).await?;
        }
        Commands::Enter { token } => {
            cli_cmds::cmd_enter(&config, token).await?;
        }
        Commands::Logs { session_id } => {
            cli_cmds::cmd_logs(&config, &session_id).await?;
        }
        Commands::Init => {
            init::run_init().await?;
        }
    }

    Ok(())
}
