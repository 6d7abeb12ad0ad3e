use clap::{Args, Subcommand};
use fee_sync::{
    Currency, Direction, EngineError, FeeEngine, FeeSyncConfig, FeeView, Precondition,
    PublishedSource, RefreshOutcome,
};
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Currency symbol, e.g. `btc`
    #[arg(long)]
    pub coin: Currency,
    /// `locking` or `unlocking`
    #[arg(long, default_value = "locking")]
    pub direction: Direction,
}

#[derive(Subcommand)]
pub enum FeeCmd {
    /// Show the stored and published fee for a selection
    Show {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a new fee with the authority
    Set {
        #[command(flatten)]
        selection: SelectionArgs,
        value: String,
    },
    /// Publish a fee under the account's registered name
    Publish {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Value to publish; defaults to the stored fee
        value: Option<String>,
    },
    /// Compare the published fee with another user's
    Compare {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        name: String,
        /// Save the other user's value as the new fee
        #[arg(long)]
        adopt: bool,
    },
}

pub async fn handle(cmd: FeeCmd, config: &FeeSyncConfig) -> Result<(), EngineError> {
    let engine = FeeEngine::connect(config)?;
    match cmd {
        FeeCmd::Show { selection, json } => {
            if let Err(err) = engine.resolve_identity().await {
                warn!(error = %err, "published value unavailable");
            }
            enter(&engine, &selection).await?;
            let view = engine.sync().view();
            if json {
                match serde_json::to_string_pretty(&view) {
                    Ok(text) => println!("{text}"),
                    Err(err) => eprintln!("{err}"),
                }
            } else {
                print_view(&view);
            }
        }
        FeeCmd::Set { selection, value } => {
            enter(&engine, &selection).await?;
            engine.sync().set_edit_value(value)?;
            engine.sync().save_staged().await?;
            print_view(&engine.sync().view());
        }
        FeeCmd::Publish { selection, value } => {
            engine.resolve_identity().await?;
            let outcome = enter(&engine, &selection).await?;
            let value = match value {
                Some(value) => value,
                None => {
                    outcome.authoritative?;
                    engine
                        .sync()
                        .view()
                        .record
                        .saved_value
                        .ok_or(Precondition::NothingStaged)?
                }
            };
            engine.sync().publish(&value).await?;
            print_view(&engine.sync().view());
        }
        FeeCmd::Compare {
            selection,
            name,
            adopt,
        } => {
            if let Err(err) = engine.resolve_identity().await {
                warn!(error = %err, "own published value unavailable");
            }
            enter(&engine, &selection).await?;
            engine.sync().fetch_other_published(&name).await?;
            if adopt {
                engine.sync().match_from(PublishedSource::Other)?;
                engine.sync().save_staged().await?;
            }
            let view = engine.sync().view();
            print_view(&view);
            println!(
                "{name}: {}",
                view.record.published_other.as_deref().unwrap_or("-")
            );
        }
    }
    engine.shutdown().await;
    Ok(())
}

/// Select the pair and wait for both initial fetches.
async fn enter(engine: &FeeEngine, args: &SelectionArgs) -> Result<RefreshOutcome, EngineError> {
    let sync = engine.sync();
    sync.select_direction(args.direction);
    let ticket = sync
        .select_currency(args.coin)
        .or_else(|| sync.current_ticket())
        .ok_or(Precondition::SelectionIncomplete)?;
    let outcome = sync.refresh(&ticket).await;
    if let Err(err) = &outcome.authoritative {
        warn!(error = %err, "authoritative fee unavailable");
    }
    Ok(outcome)
}

fn print_view(view: &FeeView) {
    let unit = view.unit.unwrap_or("");
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    if let Some(selection) = view.selection {
        println!("{} {}", selection.currency, selection.direction);
    }
    println!("saved:     {} {unit}", show(&view.record.saved_value));
    println!("editing:   {} {unit}", show(&view.record.edit_value));
    println!("published: {} {unit}", show(&view.record.published_self));
}
