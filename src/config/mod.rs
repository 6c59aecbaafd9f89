use std::collections::BTreeMap;

use rust_decimal::Decimal;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_derivation_path() -> String {
    crate::wallet::DEFAULT_DERIVATION_PATH.to_string()
}

pub(crate) fn default_treasury_module() -> String {
    "treasury".to_string()
}

pub(crate) fn default_slippage() -> Decimal {
    Decimal::new(1, 2)
}

pub(crate) fn default_aggregator_api_url() -> String {
    "https://api-sui.cetus.zone/router_v2".to_string()
}

pub(crate) fn default_route_depth() -> u32 {
    3
}

pub(crate) fn default_split_count() -> u32 {
    5
}

pub(crate) fn default_aggregator_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_provider_modules() -> BTreeMap<String, String> {
    [
        ("CETUS", "cetus"),
        ("DEEPBOOKV3", "deepbookv3"),
        ("TURBOS", "turbos"),
        ("KRIYA", "kriya_amm"),
        ("FLOWXV3", "flowx_clmm"),
        ("AFTERMATH", "aftermath"),
    ]
    .into_iter()
    .map(|(provider, module)| (provider.to_string(), module.to_string()))
    .collect()
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            network: cfg::Network::default(),
            rpc_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            logging: cfg::LoggingConfig::default(),
            wallet: cfg::WalletConfig::default(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            timezone_offset_hours: 0,
        }
    }
}

impl Default for cfg::WalletConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            mnemonic: String::new(),
            key_format: None,
            derivation_path: default_derivation_path(),
        }
    }
}

impl Default for cfg::TreasuryConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            module: default_treasury_module(),
            vaults: BTreeMap::new(),
        }
    }
}

impl Default for cfg::SwapConfig {
    fn default() -> Self {
        Self {
            slippage: default_slippage(),
            gas_budget: None,
            by_amount_in: true,
        }
    }
}

impl Default for cfg::AggregatorConfig {
    fn default() -> Self {
        Self {
            api_url: default_aggregator_api_url(),
            router_package: String::new(),
            providers: Vec::new(),
            depth: default_route_depth(),
            split_count: default_split_count(),
            timeout_ms: default_aggregator_timeout_ms(),
            provider_modules: default_provider_modules(),
        }
    }
}
