//! # CLI Interface
//!
//! Defines the command-line argument structure for `qris-node` using
//! `clap` derive. Every setting that matters in production can also come
//! from the environment, so the service runs unchanged under systemd or in a
//! container.

use clap::{Args, Parser, Subcommand};

/// QRIS dynamic charge service.
///
/// Turns a merchant's static QRIS payload into dynamic, amount-bearing
/// payloads and mints shareable charge links that rebuild them.
#[derive(Parser, Debug)]
#[command(
    name = "qris-node",
    about = "QRIS dynamic charge service",
    version,
    propagate_version = true
)]
pub struct QrisNodeCli {
    /// Log output format: `pretty` or `json`. Logs go to stderr.
    #[arg(long, global = true, env = "QRIS_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `qris-node` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the charge API and metrics endpoint.
    Serve(ServeArgs),
    /// Print the dynamic payload for an amount.
    Payload(PayloadArgs),
    /// Mint a charge token and print its link.
    Encode(EncodeArgs),
    /// Decode a charge token (or a full link) and print the charge.
    Decode(DecodeArgs),
    /// Check the CRC of a payload.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

/// The merchant's static payload.
#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    /// Static QRIS payload string, exactly as decoded from the merchant's sticker.
    #[arg(long, env = "QRIS_TEMPLATE")]
    pub template: String,
}

/// Obfuscation key for charge tokens.
#[derive(Args, Debug, Clone)]
pub struct TokenKeyArgs {
    /// Key charge tokens are XOR-obfuscated with. Not a secret: changing it
    /// invalidates every link already shared.
    #[arg(
        long,
        env = "QRIS_TOKEN_KEY",
        default_value = qris_protocol::config::DEFAULT_OBFUSCATION_KEY
    )]
    pub token_key: String,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    #[command(flatten)]
    pub key: TokenKeyArgs,

    /// Public origin charge links are built on, e.g. `https://pay.example.id`.
    #[arg(long, env = "QRIS_PUBLIC_ORIGIN", default_value = "http://127.0.0.1:8080")]
    pub public_origin: String,

    /// Port for the HTTP API.
    #[arg(long, env = "QRIS_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "QRIS_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,
}

/// Arguments for the `payload` subcommand.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// Amount in rupiah.
    #[arg(long, short = 'a')]
    pub amount: f64,
}

/// Arguments for the `encode` subcommand.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub key: TokenKeyArgs,

    /// Amount in rupiah.
    #[arg(long, short = 'a')]
    pub amount: f64,

    /// Note shown to the payer.
    #[arg(long, short = 'n')]
    pub note: Option<String>,

    /// Leave the creation timestamp out of the token.
    #[arg(long)]
    pub no_timestamp: bool,

    /// Public origin to build the link on.
    #[arg(long, env = "QRIS_PUBLIC_ORIGIN", default_value = "http://127.0.0.1:8080")]
    pub public_origin: String,
}

/// Arguments for the `decode` subcommand.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub key: TokenKeyArgs,

    /// A bare token or a full `/c/<token>` link.
    pub token: String,
}

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Payload whose trailing CRC field should be checked.
    pub payload: String,
}
