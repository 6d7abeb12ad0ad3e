use clap::Subcommand;
use fee_sync::{EngineError, FeeEngine, FeeSyncConfig, HeartbeatSettings};
use tracing::info;

#[derive(Subcommand)]
pub enum StatusCmd {
    /// Report whether fee transactions are waiting for a signature
    Status,
    /// Follow the signing status until interrupted
    Watch,
    /// Sign every pending fee transaction
    Sign,
}

pub async fn handle(cmd: StatusCmd, config: &FeeSyncConfig) -> Result<(), EngineError> {
    let mut engine = FeeEngine::connect(config)?;
    match cmd {
        StatusCmd::Status => {
            let pending = engine.reconcile().await?;
            println!("{}", describe(pending));
        }
        StatusCmd::Watch => {
            let settings = HeartbeatSettings::from_config(config)?;
            let mut status = engine.status().subscribe();
            engine.start(Some(settings))?;
            println!("{}", describe(*status.borrow_and_update()));
            loop {
                tokio::select! {
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!("{}", describe(*status.borrow_and_update()));
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("interrupted");
                        break;
                    }
                }
            }
        }
        StatusCmd::Sign => {
            engine.sync().sign_all_unsigned().await?;
            println!("signing requested");
        }
    }
    engine.shutdown().await;
    Ok(())
}

fn describe(pending: bool) -> &'static str {
    if pending {
        "unsigned fee transactions pending"
    } else {
        "no unsigned fee transactions"
    }
}
