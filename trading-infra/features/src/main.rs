use std::sync::Arc;

use anyhow::Context;
use features::{
    Dispatcher, FeatureAssembler, FeatureConfig, LogSink, load_default_feature_config,
    load_feature_config,
};
use gateway::{
    ConnectorError, GatewayConfigFile, SessionKeyProvider, StreamConnector, load_config,
    load_default_config,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Usage: `recorder [gateway_config.json] [feature_config.json]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("recorder=info".parse()?)
                .add_directive("gateway=info".parse()?)
                .add_directive("features=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mut gateway_config = match args.next() {
        Some(path) => load_config(&path).with_context(|| format!("loading {path}"))?,
        None => load_default_config()?,
    };
    let feature_config = match args.next() {
        Some(path) => load_feature_config(&path).with_context(|| format!("loading {path}"))?,
        None => load_default_feature_config()?,
    };
    gateway_config.apply_env_overrides();
    gateway_config.validate()?;
    feature_config.validate()?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        ctrl_c.cancel();
    });

    run(gateway_config, feature_config, cancel).await
}

async fn run(
    gateway_config: GatewayConfigFile,
    feature_config: FeatureConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let enabled = gateway_config.enabled_exchanges();
    let exchange = *enabled.first().context("no enabled exchange")?;
    for skipped in enabled.iter().skip(1) {
        warn!(exchange = %skipped.id, "only the first enabled exchange is recorded");
    }

    let (tx, rx) = mpsc::channel(gateway_config.global.output_queue_capacity);
    let connector_config = exchange.connector_config(&gateway_config.global);
    let connector = if exchange.private_channels {
        let rest = exchange.rest_client(&gateway_config.global)?;
        let provider: Arc<dyn SessionKeyProvider> = Arc::new(rest);
        StreamConnector::with_session(connector_config, tx, cancel.child_token(), provider)
    } else {
        StreamConnector::new(connector_config, tx, cancel.child_token())
    };

    let table = feature_config.build_table();
    info!(
        exchange = %exchange.id,
        symbols = feature_config.symbols.len(),
        columns = table.read().keys().len(),
        family = ?feature_config.family,
        "starting recorder"
    );

    let dispatcher = tokio::spawn(Dispatcher::new(table.clone(), cancel.clone()).run(rx));
    let assembler = tokio::spawn(
        FeatureAssembler::new(table, LogSink::new(), feature_config.cadence(), cancel.clone()).run(),
    );

    let symbols = feature_config.symbols();
    let listen = match connector.start(&symbols).await {
        Ok(handle) => Some(handle),
        Err(ConnectorError::Cancelled) => None,
        Err(e) => {
            cancel.cancel();
            return Err(e.into());
        }
    };
    if listen.is_some() {
        info!(streams = connector.desired_streams().len(), "feed is live");
    }

    let mut listen_result = Ok(());
    if let Some(handle) = listen {
        listen_result = handle.await?;
    }
    // the connector only stops on cancellation or a closed queue
    cancel.cancel();
    drop(connector);

    let applied = dispatcher.await?;
    let (rows, _) = match assembler.await? {
        Ok(done) => done,
        Err(e) => {
            error!(error = %e, "feature export failed");
            return Err(e.into());
        }
    };
    listen_result?;
    info!(applied, rows, "recorder stopped");
    Ok(())
}
