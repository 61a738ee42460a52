use std::sync::Arc;

use tokio::sync::mpsc;

use homar::appsettings;
use homar::reentry::{InboundCommand, InboundKind};
use homar::scheduling::DelayedCommandScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = appsettings::get();
    let timezone = settings.timezone()?;
    let scheduler = Arc::new(DelayedCommandScheduler::new(timezone));
    log::info!(
        "Homar scheduler started, default timezone {}",
        scheduler.default_timezone()
    );

    // Chat front ends wrap clones of this sender in a CommandReentry and
    // hand it to the tool layer; the worker below serves both live and
    // redelivered commands.
    let (ingestion_tx, ingestion_rx) = mpsc::channel(64);
    let ingestion_worker = tokio::spawn(run_ingestion(ingestion_rx));

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down, pending scheduled commands are dropped");
    scheduler.shutdown().await;
    drop(ingestion_tx);
    let _ = ingestion_worker.await;

    Ok(())
}

async fn run_ingestion(mut inbound: mpsc::Receiver<InboundCommand>) {
    while let Some(command) = inbound.recv().await {
        match command.kind {
            InboundKind::ScheduledRedelivery => log::info!(
                "Redelivered command for target {}: {}",
                command.target,
                command.text
            ),
            InboundKind::Human => log::info!(
                "Inbound command for target {}: {}",
                command.target,
                command.text
            ),
        }
    }
}
