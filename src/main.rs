mod api;
mod app;
mod config;
mod models;
mod services;
mod storage;
mod ui;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Cli, Command, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finchat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    let command = cli.command.unwrap_or(Command::Chat { conversation: None });

    let app = App::init(&config).await?;
    app.run(command).await
}
