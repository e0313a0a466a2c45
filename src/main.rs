//! meterbill - Turn hotel utility meter readings into costs and alerts

use clap::Parser;
use meterbill::{
    aggregation::ConsumptionAggregator,
    cli::{Cli, Command, StreamArgs},
    data_loader::DataLoader,
    engine::{Engine, RecomputeSession},
    error::{MeterbillError, Result},
    output::get_formatter,
    watch::Watcher,
};
use meterbill_core::types::{CostMode, MeterRecord, RawMeterRecord};
use meterbill_pricing::{
    TariffLoader,
    defaults::{default_tariff, default_tariffs},
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Read a single just-saved record
async fn read_pending(path: &Path) -> Result<MeterRecord> {
    let content = tokio::fs::read_to_string(path).await?;
    let raw: RawMeterRecord =
        serde_json::from_str(&content).map_err(|e| MeterbillError::Parse {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;
    let date = raw.date.clone();
    MeterRecord::from_raw(raw).ok_or_else(|| {
        MeterbillError::InvalidDate(format!("Pending record has an invalid date: {date}"))
    })
}

/// Fetch both inputs of a stream and return the final breakdown
async fn run_session(
    session: &mut RecomputeSession,
    input: &StreamArgs,
) -> Result<meterbill::engine::Breakdown> {
    let records = DataLoader::new(&input.records);
    let tariffs = TariffLoader::new(input.tariff.clone());

    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let driven = Engine::drive(session, &records, &tariffs, &tx).await;
    drop(tx);
    while rx.recv().await.is_some() {}
    driven?;

    Ok(session.current())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose overrides RUST_LOG
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new(
            "warn,meterbill=info,meterbill_core=info,meterbill_pricing=info",
        )
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let color = !cli.no_color && !cli.json && is_terminal::is_terminal(std::io::stdout());
    let formatter = get_formatter(cli.json, color);

    match cli.command {
        Command::Bill {
            input,
            filter,
            mode,
            daily,
        } => {
            info!("Billing {} from {}", input.stream, input.records.display());

            let filter = filter.to_filter()?;
            let mut session = RecomputeSession::new(input.stream, mode).with_filter(filter);
            let breakdown = run_session(&mut session, &input).await?;

            let daily_data = if daily {
                ConsumptionAggregator::aggregate_daily(
                    input.stream,
                    session.records().unwrap_or_default(),
                )
            } else {
                Vec::new()
            };

            println!("{}", formatter.format_breakdown(&breakdown, &daily_data));
        }

        Command::Check { input, pending } => {
            info!("Checking {} from {}", input.stream, input.records.display());

            let mut session = RecomputeSession::new(input.stream, CostMode::Auto);
            let mut breakdown = run_session(&mut session, &input).await?;

            if let Some(path) = &pending {
                let record = read_pending(path).await?;
                info!("Using pending record dated {}", record.date);
                breakdown = session.save_record(record);
            }

            println!("{}", formatter.format_breakdown(&breakdown, &[]));
        }

        Command::Watch {
            input,
            filter,
            mode,
            interval,
        } => {
            info!("Watching {} every {}s", input.stream, interval);

            let session =
                RecomputeSession::new(input.stream, mode).with_filter(filter.to_filter()?);
            let watcher = Watcher::new(
                session,
                DataLoader::new(&input.records),
                TariffLoader::new(input.tariff.clone()),
                interval,
            )
            .with_json(cli.json)
            .with_color(color);

            watcher.run().await?;
        }

        Command::Defaults { stream } => {
            let defaults = match stream {
                Some(stream) => BTreeMap::from([(stream, default_tariff(stream))]),
                None => default_tariffs().clone(),
            };

            println!("{}", formatter.format_defaults(&defaults));
        }
    }

    Ok(())
}
