// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::Address;
use clap::{Parser, ValueEnum};
use oxidity_batcher::app::config::GlobalSettings;
use oxidity_batcher::app::logging::setup_logging;
use oxidity_batcher::common::parsing::{parse_address_hex, parse_u256_amount};
use oxidity_batcher::data::resources::{load_addresses, load_wallets};
use oxidity_batcher::domain::chain::Chain;
use oxidity_batcher::domain::error::AppError;
use oxidity_batcher::domain::task::{AmountSpec, Operation};
use oxidity_batcher::network::aggregator::{KyberSwapClient, QuoteService};
use oxidity_batcher::network::chain_client::ChainClient;
use oxidity_batcher::network::endpoint_pool::EndpointPool;
use oxidity_batcher::network::rpc::AlloyRpc;
use oxidity_batcher::services::orchestrator::Orchestrator;
use oxidity_batcher::services::report::TracingSink;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OperationKind {
    Swap,
    Transfer,
    Balance,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Batch swaps, transfers and balance reads across many EVM wallets"
)]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long, env = "BATCHER_CONFIG")]
    config: Option<String>,

    #[arg(long, value_enum, default_value_t = OperationKind::Balance)]
    operation: OperationKind,

    /// Swap input token address, or `native`
    #[arg(long)]
    token_in: Option<String>,

    /// Swap output token address, or `native`
    #[arg(long)]
    token_out: Option<String>,

    /// Token to transfer, or the single token to read balances for
    #[arg(long)]
    token: Option<String>,

    /// Fixed amount in base units (decimal or 0x hex)
    #[arg(long, conflicts_with = "percent")]
    amount: Option<String>,

    /// Share of each wallet's balance, 0-100
    #[arg(long)]
    percent: Option<f64>,

    /// Sign but never submit
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Slippage basis points (overrides config/env)
    #[arg(long)]
    slippage_bps: Option<u32>,
}

fn parse_token(chain: Chain, flag: &str, raw: Option<&str>) -> Result<Address, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Config(format!("--{flag} is required for this operation")))?;
    if raw.eq_ignore_ascii_case("native") || raw.eq_ignore_ascii_case(chain.native_symbol()) {
        return Ok(chain.native_token());
    }
    parse_address_hex(raw).ok_or_else(|| AppError::InvalidAddress(raw.to_string()))
}

fn amount_spec(cli: &Cli) -> Result<AmountSpec, AppError> {
    match (&cli.amount, cli.percent) {
        (Some(raw), _) => parse_u256_amount(raw)
            .map(AmountSpec::Fixed)
            .ok_or_else(|| AppError::Config(format!("Invalid --amount '{raw}'"))),
        (None, Some(percent)) => AmountSpec::percent(percent),
        (None, None) => Err(AppError::Config(
            "--amount or --percent is required for this operation".into(),
        )),
    }
}

fn build_operation(cli: &Cli, settings: &GlobalSettings) -> Result<Operation, AppError> {
    let chain = settings.chain;
    match cli.operation {
        OperationKind::Swap => Ok(Operation::Swap {
            token_in: parse_token(chain, "token-in", cli.token_in.as_deref())?,
            token_out: parse_token(chain, "token-out", cli.token_out.as_deref())?,
            amount: amount_spec(cli)?,
        }),
        OperationKind::Transfer => Ok(Operation::Transfer {
            token: parse_token(chain, "token", cli.token.as_deref())?,
            amount: amount_spec(cli)?,
            receivers: load_addresses(Path::new(&settings.receivers_path))?,
        }),
        OperationKind::Balance => {
            let tokens = match cli.token.as_deref() {
                Some(raw) => vec![parse_token(chain, "token", Some(raw))?],
                None => load_addresses(Path::new(&settings.tokens_path))?,
            };
            Ok(Operation::Balance { tokens })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    if cli.dry_run {
        settings.dry_run = true;
    }
    if let Some(bps) = cli.slippage_bps {
        settings.slippage_bps = bps;
        settings.validate()?;
    }
    setup_logging(settings.log_level(), settings.log_json);

    let operation = build_operation(&cli, &settings)?;
    let wallets = load_wallets(Path::new(&settings.wallets_path))?;

    let target = settings.chain_target()?;
    let pool = Arc::new(EndpointPool::new(
        target.endpoints.clone(),
        settings.health_policy(),
    )?);
    let client = Arc::new(ChainClient::new(
        target.chain,
        pool,
        Arc::new(AlloyRpc::new()),
        settings.client_options(),
    ));
    let quotes: Arc<dyn QuoteService> =
        Arc::new(KyberSwapClient::new(settings.aggregator_config())?);
    let orchestrator = Orchestrator::new(target, client, quotes, settings.orchestrator_config()?);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "orchestrator", "Ctrl-C received; finishing in-flight wallets");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(wallets, &operation, &TracingSink).await?;
    tracing::info!(target: "report", "{}", report.summary());

    if let Some(fatal) = report.fatal_error {
        return Err(AppError::Unknown(anyhow::anyhow!("run aborted: {fatal}")));
    }
    Ok(())
}
