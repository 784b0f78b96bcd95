#![allow(dead_code)]

use std::sync::Arc;

use tpo_loadgen::config::{
    AuthConfig, BaseUrls, Config, HttpConfig, ServerConfig, StatsConfig, TargetConfig,
    TaskWeight, WorkloadConfig,
};
use tpo_loadgen::domain::{catalog, Market, Stage, TargetEnv, Vendor, VendorProfile};
use tpo_loadgen::workload::TaskKind;

/// A config whose every base URL points at the given test gateway.
pub fn test_config(
    env: TargetEnv,
    base_url: &str,
    tasks: &[(TaskKind, u32)],
    stages: Vec<Stage>,
) -> Config {
    Config {
        target: TargetConfig {
            environment: env,
            base_urls: BaseUrls {
                perf: base_url.to_string(),
                alb: base_url.to_string(),
                nlb: base_url.to_string(),
            },
        },
        workload: WorkloadConfig {
            tasks: tasks
                .iter()
                .map(|(name, weight)| TaskWeight {
                    name: *name,
                    weight: *weight,
                })
                .collect(),
            stages,
            default_rampup: 50.0,
            release_wait_secs: 0,
            log_responses: false,
        },
        auth: AuthConfig {
            use_global_tokens: false,
        },
        stats: StatsConfig {
            console_interval_secs: 60,
        },
        server: ServerConfig {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 10,
        },
        http: HttpConfig { timeout_seconds: 5 },
    }
}

pub fn profile_for(vendor: Vendor, market: Market) -> Arc<VendorProfile> {
    catalog()
        .iter()
        .find(|p| p.vendor == vendor && p.market == market)
        .cloned()
        .expect("catalog profile")
}
