use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::wallet::KeyFormat;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub network: Network,
    /// 显式指定的全节点地址，优先于 `network` 的默认地址。
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default = "super::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

impl GlobalConfig {
    pub fn resolved_rpc_url(&self) -> String {
        self.rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.network.default_rpc_url().to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "localnet" => Ok(Self::Localnet),
            other => Err(format!("未知网络: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub timezone_offset_hours: i8,
}

/// 钱包配置。私钥与助记词也可以（且更推荐）通过环境变量提供。
#[derive(Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub mnemonic: String,
    #[serde(default)]
    pub key_format: Option<KeyFormat>,
    #[serde(default = "super::default_derivation_path")]
    pub derivation_path: String,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &redacted(&self.private_key))
            .field("mnemonic", &redacted(&self.mnemonic))
            .field("key_format", &self.key_format)
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryConfig {
    /// 金库合约所在的 package。
    #[serde(default)]
    pub package: String,
    #[serde(default = "super::default_treasury_module")]
    pub module: String,
    #[serde(default)]
    pub vaults: BTreeMap<String, VaultConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// 金库持有的币种，例如 `0x2::sui::SUI`。
    pub asset: String,
    pub treasury_id: String,
    /// 提取时需要的配置对象；只做存入的金库可以不填。
    #[serde(default)]
    pub config_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "super::default_slippage")]
    pub slippage: Decimal,
    #[serde(default)]
    pub gas_budget: Option<u64>,
    #[serde(default = "super::default_true")]
    pub by_amount_in: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "super::default_aggregator_api_url")]
    pub api_url: String,
    /// 路由合约 package，阈值检查 `router::check_coin_threshold` 位于其中。
    #[serde(default)]
    pub router_package: String,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default = "super::default_route_depth")]
    pub depth: u32,
    #[serde(default = "super::default_split_count")]
    pub split_count: u32,
    #[serde(default = "super::default_aggregator_timeout_ms")]
    pub timeout_ms: u64,
    /// provider 名称 → 路由合约中对应的模块名。
    #[serde(default = "super::default_provider_modules")]
    pub provider_modules: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoringConfig {
    /// 例如 `0.0.0.0:9898`；不填则不启动 Prometheus 导出器。
    #[serde(default)]
    pub prometheus_listen: Option<String>,
}
