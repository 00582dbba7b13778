// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # QRIS Charge Node
//!
//! Entry point for the `qris-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and serves the charge API. The remaining subcommands
//! are one-shot tools over the same core:
//!
//! - `serve`  : run the HTTP API and the metrics endpoint
//! - `payload`: print the dynamic payload for an amount
//! - `encode` : mint a charge token and print its link
//! - `decode` : print the charge inside a token or link
//! - `verify` : check a payload's CRC
//! - `version`: print build version information

mod api;
mod cli;
mod links;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

use qris_protocol::{
    format_idr, verify_checksum, Amount, ChargeRecord, DynamicPayloadBuilder, ObfuscationKey,
    TokenCodec,
};

use cli::{Commands, QrisNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QrisNodeCli::parse();

    let format: LogFormat = cli
        .log_format
        .parse()
        .map_err(anyhow::Error::msg)
        .context("invalid --log-format")?;
    logging::init_logging(logging::DEFAULT_FILTER, format)
        .context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Payload(args) => print_payload(args),
        Commands::Encode(args) => encode_charge(args),
        Commands::Decode(args) => decode_charge(args),
        Commands::Verify(args) => verify_payload(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_builder(args: &cli::TemplateArgs) -> Result<DynamicPayloadBuilder> {
    DynamicPayloadBuilder::new(&args.template).context("QRIS_TEMPLATE is not a usable payload")
}

fn load_codec(args: &cli::TokenKeyArgs) -> Result<TokenCodec> {
    let key: ObfuscationKey = args
        .token_key
        .parse()
        .context("QRIS_TOKEN_KEY is not a usable key")?;
    Ok(TokenCodec::new(key))
}

/// Serves the charge API and the metrics endpoint until a shutdown signal.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        public_origin = %args.public_origin,
        "starting qris-node"
    );

    // --- Template and key ---
    let builder = load_builder(&args.template)?;
    let codec = load_codec(&args.key)?;
    tracing::info!(
        fields = builder.template().len(),
        merchant = builder.merchant_name().unwrap_or("-"),
        city = builder.merchant_city().unwrap_or("-"),
        "merchant template loaded"
    );

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        env!("CARGO_PKG_VERSION"),
        &args.public_origin,
        builder,
        codec,
        Arc::clone(&node_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", api_addr))?;
    tracing::info!("HTTP API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = metrics::metrics_router(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    let (stop_tx, stop_rx) = watch::channel(false);
    let api_server = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let metrics_server = axum::serve(metrics_listener, metrics_router)
        .with_graceful_shutdown(stopped(stop_rx));

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, draining connections");
        let _ = stop_tx.send(true);
    });

    let (api_res, metrics_res) = tokio::join!(api_server, metrics_server);
    if let Err(e) = api_res {
        tracing::error!("API server error: {}", e);
    }
    if let Err(e) = metrics_res {
        tracing::error!("Metrics server error: {}", e);
    }

    tracing::info!("qris-node stopped");
    Ok(())
}

/// Prints the dynamic payload for an amount to stdout.
fn print_payload(args: cli::PayloadArgs) -> Result<()> {
    let builder = load_builder(&args.template)?;
    let amount = Amount::new(args.amount)?;
    println!("{}", builder.build(amount));
    Ok(())
}

/// Mints a token and prints it with its link.
fn encode_charge(args: cli::EncodeArgs) -> Result<()> {
    let codec = load_codec(&args.key)?;
    let mut record = ChargeRecord::new(Amount::new(args.amount)?);
    if let Some(note) = args.note {
        record = record.with_note(note);
    }
    if !args.no_timestamp {
        record = record.with_created_at(Utc::now());
    }

    let token = codec.encode(&record);
    println!("token  : {}", token);
    println!("link   : {}", links::charge_link(&args.public_origin, &token));
    println!("amount : {}", format_idr(record.amount));
    Ok(())
}

/// Prints the charge inside a token as JSON, or fails for a bad link.
fn decode_charge(args: cli::DecodeArgs) -> Result<()> {
    let codec = load_codec(&args.key)?;
    let token = links::token_from_link(&args.token);
    let record = codec
        .decode(token)
        .with_context(|| format!("{}: {}", api::INVALID_LINK_MESSAGE, token))?;

    let out = serde_json::json!({
        "amount": record.amount.value(),
        "display_amount": format_idr(record.amount),
        "note": record.note,
        "created_at": record.created_at.map(|t| t.to_rfc3339()),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Checks the trailing CRC of a payload. Exits non-zero on mismatch.
fn verify_payload(args: cli::VerifyArgs) -> Result<()> {
    let payload = args.payload.trim();
    if !verify_checksum(payload) {
        bail!("checksum mismatch");
    }
    println!("checksum ok");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("qris-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Resolves once the shutdown flag is raised or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal source is ignored and the other still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
