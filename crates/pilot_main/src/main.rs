use anyhow::Result;
use clap::Parser;
use pilot_config::PilotConfig;
use pilot_main::{Cli, Command, replay};
use pilot_tracker::init_tracing;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PilotConfig::from_env()?;
    let _guard = init_tracing(config.log_dir.as_deref())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Replay(args) => {
            let transcript = replay(&args, config, cancel).await?;
            print!("{transcript}");
        }
    }

    Ok(())
}
