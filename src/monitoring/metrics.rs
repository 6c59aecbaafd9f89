use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

const COUNTERS: &[(&str, &str)] = &[
    ("treasury_router_runs_total", "按操作类型统计的运行次数"),
    ("treasury_router_route_lookups_total", "路由查询结果（found / not_found）"),
    ("treasury_router_submissions_total", "已签名并提交的交易数"),
    ("treasury_router_settlements_total", "已确认结果的交易数（success / failure）"),
    ("treasury_router_unknown_outcomes_total", "提交后未能确认结果的交易数"),
    ("treasury_router_dry_runs_total", "试运行次数（success / failure）"),
];

/// 启动 Prometheus 导出器；未启动时所有计数器调用都会被跳过。
///
/// 重复调用只生效一次，返回首次绑定的地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr = parse_listen(listen)?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("Prometheus 导出器启动失败")?;
            for (name, help) in COUNTERS {
                describe_counter!(*name, *help);
            }
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            info!(target: "monitoring", listen = %addr, "Prometheus 导出器已启动");
            Ok(addr)
        })
        .copied()
}

fn parse_listen(listen: &str) -> Result<SocketAddr> {
    listen
        .trim()
        .parse()
        .with_context(|| format!("Prometheus 监听地址非法: {listen}"))
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
