use metrics::counter;
use tracing::{info, warn};

use crate::sui::SuiAddress;

use super::metrics::prometheus_enabled;

pub fn run_started(operation: &'static str, sender: &SuiAddress, dry_run: bool) {
    info!(
        target: "monitoring::run",
        event = "run_started",
        operation,
        sender = %sender,
        dry_run,
        "开始执行"
    );

    if prometheus_enabled() {
        counter!("treasury_router_runs_total", "operation" => operation).increment(1);
    }
}

pub fn route_found(from: &str, to: &str, amount_in: u64, amount_out: u64, legs: usize) {
    info!(
        target: "monitoring::route",
        event = "route_found",
        from,
        to,
        amount_in,
        amount_out,
        legs,
        "路由可用"
    );

    if prometheus_enabled() {
        counter!("treasury_router_route_lookups_total", "result" => "found").increment(1);
    }
}

pub fn route_not_found(from: &str, to: &str, amount: u64) {
    info!(
        target: "monitoring::route",
        event = "route_not_found",
        from,
        to,
        amount,
        "未找到可用路由，本次运行结束"
    );

    if prometheus_enabled() {
        counter!("treasury_router_route_lookups_total", "result" => "not_found").increment(1);
    }
}

pub fn transaction_submitted(operation: &'static str, digest: &str, gas_budget: u64) {
    info!(
        target: "monitoring::transaction",
        event = "submitted",
        operation,
        digest,
        gas_budget,
        "交易已提交"
    );

    if prometheus_enabled() {
        counter!("treasury_router_submissions_total", "operation" => operation).increment(1);
    }
}

pub fn transaction_settled(operation: &'static str, digest: &str, success: bool, reason: Option<&str>) {
    if success {
        info!(
            target: "monitoring::transaction",
            event = "settled",
            operation,
            digest,
            success,
            "交易执行成功"
        );
    } else {
        warn!(
            target: "monitoring::transaction",
            event = "settled",
            operation,
            digest,
            success,
            reason = reason.unwrap_or(""),
            "交易链上执行失败"
        );
    }

    if prometheus_enabled() {
        let result = if success { "success" } else { "failure" };
        counter!(
            "treasury_router_settlements_total",
            "operation" => operation,
            "result" => result
        )
        .increment(1);
    }
}

pub fn transaction_outcome_unknown(operation: &'static str, digest: &str, error: &str) {
    warn!(
        target: "monitoring::transaction",
        event = "outcome_unknown",
        operation,
        digest,
        error,
        "交易提交后未能确认结果，链上状态未知"
    );

    if prometheus_enabled() {
        counter!("treasury_router_unknown_outcomes_total", "operation" => operation).increment(1);
    }
}

pub fn dry_run_completed(operation: &'static str, digest: &str, success: bool, reason: Option<&str>) {
    if success {
        info!(
            target: "monitoring::transaction",
            event = "dry_run",
            operation,
            digest,
            success,
            "试运行完成"
        );
    } else {
        warn!(
            target: "monitoring::transaction",
            event = "dry_run",
            operation,
            digest,
            success,
            reason = reason.unwrap_or(""),
            "试运行显示交易将在链上失败"
        );
    }

    if prometheus_enabled() {
        let result = if success { "success" } else { "failure" };
        counter!(
            "treasury_router_dry_runs_total",
            "operation" => operation,
            "result" => result
        )
        .increment(1);
    }
}
