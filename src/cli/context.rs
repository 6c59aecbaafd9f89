use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use time::{UtcOffset, macros::format_description};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use crate::api::AggregatorApiClient;
use crate::cli::args::ExecutionOverrides;
use crate::config::{AppConfig, ConfigError, LoggingConfig, VaultConfig, load_config};
use crate::engine::{
    CetusRouter, ExecutionMode, OrchestratorSettings, RouterSettings, Slippage, SwapDirection,
    TreasuryContract, TreasuryReference,
};
use crate::gateway::{ExecuteOptions, SuiRpcGateway};
use crate::sui::{CoinType, ObjectId};

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    const QUIET_TARGETS: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util::client::legacy", "warn"),
        ("reqwest", "info"),
    ];
    for (module, level) in QUIET_TARGETS {
        if !config.level.contains(module) {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "日志时区偏移非法 {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `treasury-router --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    load_config(path)
}

pub fn init_configs(args: crate::cli::args::InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "treasury.toml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/treasury.toml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}

pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("treasury-router/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("构建 HTTP 客户端失败")
}

fn validate_endpoint(name: &str, value: &str) -> Result<String> {
    let url = Url::parse(value.trim()).with_context(|| format!("{name} 不是合法的 URL: {value}"))?;
    match url.scheme() {
        "http" | "https" => Ok(value.trim().trim_end_matches('/').to_string()),
        other => Err(anyhow!("{name} 仅支持 http/https，实际为 {other}")),
    }
}

pub fn build_gateway(config: &AppConfig, client: reqwest::Client) -> Result<SuiRpcGateway> {
    let endpoint = validate_endpoint("global.rpc_url", &config.global.resolved_rpc_url())?;
    Ok(SuiRpcGateway::new(
        endpoint,
        client,
        Duration::from_millis(config.global.request_timeout_ms),
    ))
}

/// 构建路由客户端。只查询路由或只做存入时不需要路由合约 package。
pub fn build_router(
    config: &AppConfig,
    client: reqwest::Client,
    require_package: bool,
) -> Result<CetusRouter> {
    let aggregator = &config.aggregator;
    let api_url = validate_endpoint("aggregator.api_url", &aggregator.api_url)?;
    let router_package = if aggregator.router_package.trim().is_empty() {
        if require_package {
            return Err(anyhow!("aggregator.router_package 未配置"));
        }
        ObjectId::ZERO
    } else {
        parse_object_id("aggregator.router_package", &aggregator.router_package)?
    };

    let client = AggregatorApiClient::new(
        client,
        api_url,
        Duration::from_millis(aggregator.timeout_ms),
    );
    Ok(CetusRouter::new(
        client,
        RouterSettings {
            router_package,
            providers: aggregator.providers.clone(),
            depth: aggregator.depth,
            split_count: aggregator.split_count,
            provider_modules: aggregator.provider_modules.clone(),
        },
    ))
}

pub fn parse_object_id(field: &str, value: &str) -> Result<ObjectId> {
    ObjectId::from_str(value.trim()).map_err(|err| anyhow!("{field} 非法: {err}"))
}

pub fn parse_coin_type(value: &str) -> Result<CoinType> {
    CoinType::from_str(value.trim()).map_err(|err| anyhow!("币种类型 {value} 非法: {err}"))
}

pub fn treasury_contract(config: &AppConfig) -> Result<TreasuryContract> {
    if config.treasury.package.trim().is_empty() {
        return Err(anyhow!("treasury.package 未配置"));
    }
    Ok(TreasuryContract {
        package: parse_object_id("treasury.package", &config.treasury.package)?,
        module: config.treasury.module.clone(),
    })
}

/// 按名称查找金库，返回合约引用及其持有的币种。
pub fn resolve_vault(config: &AppConfig, name: &str) -> Result<(TreasuryReference, CoinType)> {
    let vault: &VaultConfig = config.treasury.vaults.get(name).ok_or_else(|| {
        let known: Vec<&str> = config.treasury.vaults.keys().map(String::as_str).collect();
        anyhow!("未找到金库 {name}，已配置: [{}]", known.join(", "))
    })?;

    let reference = TreasuryReference {
        contract: treasury_contract(config)?,
        treasury_id: parse_object_id(&format!("treasury.vaults.{name}.treasury_id"), &vault.treasury_id)?,
        config_id: vault
            .config_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_object_id(&format!("treasury.vaults.{name}.config_id"), value))
            .transpose()?,
    };
    Ok((reference, parse_coin_type(&vault.asset)?))
}

pub fn swap_direction(config: &AppConfig, exact_out: bool) -> SwapDirection {
    if exact_out || !config.swap.by_amount_in {
        SwapDirection::AmountOut
    } else {
        SwapDirection::AmountIn
    }
}

pub fn orchestrator_settings(
    config: &AppConfig,
    overrides: &ExecutionOverrides,
    dry_run: bool,
) -> Result<OrchestratorSettings> {
    let tolerance = overrides.slippage.unwrap_or(config.swap.slippage);
    Ok(OrchestratorSettings {
        slippage: Slippage::new(tolerance)?,
        gas_budget: overrides.gas_budget.or(config.swap.gas_budget),
        mode: if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Execute
        },
        options: ExecuteOptions::default(),
    })
}
