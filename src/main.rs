use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: cli::Cli) -> Result<()> {
    let client = commands::client(args.base_url)?;

    match args.command {
        cli::Commands::List { resource } => commands::list::execute(&client, resource, args.json).await,
        cli::Commands::Create { resource } => {
            commands::create::execute(&client, resource, args.json).await
        }
    }
}

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
