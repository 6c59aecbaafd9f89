use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::cli::args::{Cli, Command, ExecutionOverrides, RouteCmd};
use crate::cli::context::{
    build_gateway, build_http_client, build_router, init_configs, orchestrator_settings,
    parse_coin_type, resolve_vault, swap_direction,
};
use crate::config::AppConfig;
use crate::engine::{
    Operation, Orchestrator, Route, RouteDiscovery, RunOutcome, SwapDirection,
};
use crate::gateway::{ExecutionResult, ExecutionStatus, LedgerGateway};
use crate::sui::SuiAddress;
use crate::wallet::load_identity;

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let dry_run = cli.dry_run;
    match cli.command {
        Command::Init(args) => init_configs(args),
        Command::Address => {
            let identity = load_identity(&config.global.wallet)?;
            println!("{}", identity.address());
            Ok(())
        }
        Command::Status => {
            let gateway = build_gateway(&config, build_http_client()?)?;
            let checkpoint = gateway.latest_checkpoint().await?;
            println!("网络: {}", config.global.network);
            println!("节点: {}", gateway.endpoint());
            println!("最新 checkpoint: {checkpoint}");
            Ok(())
        }
        Command::Route(cmd) => print_route(&config, cmd).await,
        Command::Deposit(cmd) => {
            let (treasury, asset) = resolve_vault(&config, &cmd.vault)?;
            let operation = Operation::Deposit {
                treasury,
                asset,
                amount: cmd.amount,
            };
            execute(&config, operation, &cmd.overrides, dry_run, false).await
        }
        Command::Swap(cmd) => {
            let recipient = cmd
                .recipient
                .as_deref()
                .map(|value| {
                    value
                        .parse::<SuiAddress>()
                        .map_err(|err| anyhow!("接收地址非法: {err}"))
                })
                .transpose()?;
            let operation = Operation::Swap {
                from: parse_coin_type(&cmd.from)?,
                to: parse_coin_type(&cmd.to)?,
                amount: cmd.amount,
                direction: swap_direction(&config, cmd.exact_out),
                recipient,
            };
            execute(&config, operation, &cmd.overrides, dry_run, true).await
        }
        Command::TreasurySwap(cmd) => {
            if cmd.from_vault == cmd.to_vault {
                return Err(anyhow!("来源金库与目标金库相同: {}", cmd.from_vault));
            }
            let (source, from) = resolve_vault(&config, &cmd.from_vault)?;
            let (target, to) = resolve_vault(&config, &cmd.to_vault)?;
            let operation = Operation::TreasurySwap {
                source,
                target,
                from,
                to,
                amount: cmd.amount,
                direction: swap_direction(&config, cmd.exact_out),
            };
            execute(&config, operation, &cmd.overrides, dry_run, true).await
        }
    }
}

async fn execute(
    config: &AppConfig,
    operation: Operation,
    overrides: &ExecutionOverrides,
    dry_run: bool,
    needs_router: bool,
) -> Result<()> {
    let settings = orchestrator_settings(config, overrides, dry_run)?;
    let identity = load_identity(&config.global.wallet)?;
    let http = build_http_client()?;
    let gateway = build_gateway(config, http.clone())?;
    let router = build_router(config, http, needs_router)?;

    info!(
        target: "cli",
        operation = operation.label(),
        sender = %identity.address(),
        rpc = gateway.endpoint(),
        slippage = %settings.slippage,
        dry_run,
        "准备执行"
    );

    let orchestrator = Orchestrator::new(&identity, &gateway, &router, settings);
    let outcome = tokio::select! {
        res = orchestrator.run(operation) => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "cli", "收到终止信号，放弃本次运行");
            return Err(orchestrator.interrupted().into());
        }
    };

    match outcome {
        RunOutcome::Settled(result) => {
            println!("交易执行成功!");
            print_result(&result);
        }
        RunOutcome::Simulated(result) => {
            println!("试运行完成（未提交）");
            print_result(&result);
        }
        RunOutcome::NoRoute { from, to } => {
            println!("未找到 {from} → {to} 的可用路由，未提交交易");
        }
    }
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    println!("交易摘要: {}", result.digest);
    match &result.status {
        ExecutionStatus::Success => println!("状态: success"),
        ExecutionStatus::Failure { reason } => {
            println!("状态: failure ({reason})")
        }
    }
    let gas = &result.gas_used;
    println!(
        "gas: computation={} storage={} rebate={}",
        gas.computation_cost, gas.storage_cost, gas.storage_rebate
    );
    for event in &result.events {
        println!("事件: {} {}", event.event_type, event.parsed_json);
    }
}

async fn print_route(config: &AppConfig, cmd: RouteCmd) -> Result<()> {
    let router = build_router(config, build_http_client()?, false)?;
    let from = parse_coin_type(&cmd.from)?;
    let to = parse_coin_type(&cmd.to)?;
    let direction = swap_direction(config, cmd.exact_out);

    match router.find_route(&from, &to, cmd.amount, direction).await? {
        Some(route) => print_route_summary(&route),
        None => println!("未找到 {from} → {to} 的可用路由"),
    }
    Ok(())
}

fn print_route_summary(route: &Route) {
    let mode = match route.direction() {
        SwapDirection::AmountIn => "exact-in",
        SwapDirection::AmountOut => "exact-out",
    };
    println!("{} → {} ({mode})", route.from_coin(), route.to_coin());
    println!("输入: {}", route.amount_in());
    println!("预期输出: {}", route.amount_out());
    println!(
        "路径: {} 条，共 {} 跳，来源 [{}]",
        route.leg_count(),
        route.hop_count(),
        route.providers().join(", ")
    );
    if let Some(request_id) = route.request_id() {
        println!("request_id: {request_id}");
    }
}
