//! transitml - Main Entry Point

use clap::Parser;
use transitml::cli::{cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transitml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            output,
            mission,
            seed,
            ranking,
        } => {
            cmd_train(&data, &output, &mission, seed, ranking.as_deref())?;
        }
        Commands::Predict {
            model,
            data,
            output,
        } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Serve { host, port, model } => {
            cmd_serve(&host, port, model.as_deref()).await?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
