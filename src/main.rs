mod capture;
mod cli;
mod cli_cmds;
mod config;
mod gateway;
mod host;
mod init;
mod manual;
mod session;
mod token;
mod verify;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
