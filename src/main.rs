use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;

mod api;
mod cli;
mod config;
mod engine;
mod gateway;
mod monitoring;
mod sui;
mod wallet;

use cli::args::Cli;
use cli::context::{init_tracing, load_configuration};
use engine::EngineError;

/// 交易已上链但执行失败。
const EXIT_ON_CHAIN_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let on_chain = matches!(
                err.downcast_ref::<EngineError>(),
                Some(EngineError::OnChainFailure { .. })
            );
            error!(target: "main", error = %err, "运行失败");
            eprintln!("错误: {err:#}");
            if on_chain {
                ExitCode::from(EXIT_ON_CHAIN_FAILURE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> Result<()> {
    // .env 缺失不是错误
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;

    if let Some(listen) = config
        .monitoring
        .prometheus_listen
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        monitoring::try_init_prometheus(listen)?;
    }

    cli::run(cli, config).await
}
