use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "treasury-router", version, about = "Sui 金库存取与聚合兑换工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 treasury.toml 或 config/treasury.toml）"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "只做试运行，不提交交易")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 从 gas 币拆出指定数量存入金库
    Deposit(DepositCmd),
    /// 通过聚合器兑换，输出币转回自己（或指定地址）
    Swap(SwapCmd),
    /// 从一个金库提取、兑换后存入另一个金库
    #[command(name = "treasury-swap")]
    TreasurySwap(TreasurySwapCmd),
    /// 只查询并打印路由，不构建交易
    Route(RouteCmd),
    /// 查询全节点最新 checkpoint
    Status,
    /// 打印当前签名地址
    Address,
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExecutionOverrides {
    #[arg(long, help = "滑点容忍度，例如 0.01 表示 1%")]
    pub slippage: Option<Decimal>,
    #[arg(long, value_name = "MIST", help = "固定 gas 预算，覆盖配置文件")]
    pub gas_budget: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DepositCmd {
    #[arg(long, help = "配置中的金库名称")]
    pub vault: String,
    #[arg(long, help = "存入数量（最小单位）")]
    pub amount: u64,
    #[command(flatten)]
    pub overrides: ExecutionOverrides,
}

#[derive(Args, Debug)]
pub struct SwapCmd {
    #[arg(long, help = "输入币类型，例如 0x2::sui::SUI")]
    pub from: String,
    #[arg(long, help = "输出币类型")]
    pub to: String,
    #[arg(long, help = "数量（最小单位）；--exact-out 时为期望输出")]
    pub amount: u64,
    #[arg(long, help = "按精确输出数量询价")]
    pub exact_out: bool,
    #[arg(long, help = "输出币接收地址，默认转回签名地址")]
    pub recipient: Option<String>,
    #[command(flatten)]
    pub overrides: ExecutionOverrides,
}

#[derive(Args, Debug)]
pub struct TreasurySwapCmd {
    #[arg(long, help = "提取来源金库名称")]
    pub from_vault: String,
    #[arg(long, help = "存入目标金库名称")]
    pub to_vault: String,
    #[arg(long, help = "数量（最小单位）；--exact-out 时为期望输出")]
    pub amount: u64,
    #[arg(long, help = "按精确输出数量询价")]
    pub exact_out: bool,
    #[command(flatten)]
    pub overrides: ExecutionOverrides,
}

#[derive(Args, Debug)]
pub struct RouteCmd {
    #[arg(long, help = "输入币类型")]
    pub from: String,
    #[arg(long, help = "输出币类型")]
    pub to: String,
    #[arg(long, help = "数量（最小单位）")]
    pub amount: u64,
    #[arg(long, help = "按精确输出数量询价")]
    pub exact_out: bool,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}
