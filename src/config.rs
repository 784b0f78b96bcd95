use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::domain::{Stage, TargetEnv};
use crate::workload::TaskKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub workload: WorkloadConfig,
    pub auth: AuthConfig,
    pub stats: StatsConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub environment: TargetEnv,
    pub base_urls: BaseUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseUrls {
    pub perf: String,
    pub alb: String,
    pub nlb: String,
}

impl BaseUrls {
    pub fn for_env(&self, env: TargetEnv) -> &str {
        match env {
            TargetEnv::Perf => &self.perf,
            TargetEnv::Alb => &self.alb,
            TargetEnv::Nlb => &self.nlb,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    pub tasks: Vec<TaskWeight>,
    pub stages: Vec<Stage>,
    pub default_rampup: f64,
    pub release_wait_secs: u64,
    pub log_responses: bool,
}

/// A task family and its relative weight; 0 disables the task for the run.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TaskWeight {
    pub name: TaskKind,
    pub weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub use_global_tokens: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    pub console_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

impl Config {
    /// Shipped defaults, then an optional operator file, then
    /// `TPO_LOADGEN__`-prefixed environment variables.
    pub fn load(operator_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config/default.toml"));
        if let Some(path) = operator_file {
            figment = figment.merge(Toml::file(path));
        }
        let cfg: Config = figment
            .merge(Env::prefixed("TPO_LOADGEN__").split("__"))
            .extract()
            .context("loading configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workload.stages.is_empty() {
            bail!("workload.stages must declare at least one stage");
        }
        for (i, stage) in self.workload.stages.iter().enumerate() {
            stage
                .validate()
                .with_context(|| format!("workload.stages[{i}]"))?;
        }
        if !self.workload.tasks.iter().any(|t| t.weight > 0) {
            bail!("workload.tasks needs at least one task with a positive weight");
        }
        if self.workload.default_rampup <= 0.0 {
            bail!(
                "workload.default_rampup must be positive, got {}",
                self.workload.default_rampup
            );
        }
        if self.http.timeout_seconds == 0 {
            bail!("http.timeout_seconds must be positive");
        }
        if self.stats.console_interval_secs == 0 {
            bail!("stats.console_interval_secs must be positive");
        }
        Ok(())
    }

    pub fn task_weights(&self) -> Vec<(TaskKind, u32)> {
        self.workload
            .tasks
            .iter()
            .map(|t| (t.name, t.weight))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> Result<Config> {
        let cfg: Config = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .context("parsing test config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn base_toml() -> String {
        r#"
            [target]
            environment = "alb"
            [target.base_urls]
            perf = "https://perf.example.com"
            alb = "http://{market}.example.com:{port}"
            nlb = "http://{market}.example.com:9000"

            [workload]
            default_rampup = 10.0
            release_wait_secs = 180
            log_responses = false
            tasks = [
                { name = "order", weight = 1 },
                { name = "release", weight = 1 },
            ]
            [[workload.stages]]
            target_rps = 5.0
            minutes_to_reach_target = 1.0

            [auth]
            use_global_tokens = false
            [stats]
            console_interval_secs = 10
            [server]
            enabled = false
            host = "127.0.0.1"
            port = 8089
            request_timeout_secs = 10
            [http]
            timeout_seconds = 10
        "#
        .to_string()
    }

    #[test]
    fn valid_config_parses() {
        let cfg = config_from(&base_toml()).unwrap();
        assert_eq!(cfg.target.environment, TargetEnv::Alb);
        assert_eq!(cfg.workload.stages.len(), 1);
        // Omitted curve falls back to 2.
        assert_eq!(cfg.workload.stages[0].curve, 2.0);
    }

    #[test]
    fn unknown_task_name_is_rejected() {
        let toml = base_toml().replace("\"order\"", "\"make_coffee\"");
        assert!(config_from(&toml).is_err());
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let toml = base_toml()
            .replace("{ name = \"order\", weight = 1 }", "{ name = \"order\", weight = 0 }")
            .replace("{ name = \"release\", weight = 1 }", "{ name = \"release\", weight = 0 }");
        let err = config_from(&toml).unwrap_err();
        assert!(err.to_string().contains("positive weight"));
    }

    #[test]
    fn invalid_stage_is_rejected_with_index() {
        let toml = base_toml().replace("minutes_to_reach_target = 1.0", "minutes_to_reach_target = 0.0");
        let err = config_from(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("workload.stages[0]"));
    }

    #[test]
    fn missing_stages_are_rejected() {
        let toml = base_toml().replace(
            "[[workload.stages]]\n            target_rps = 5.0\n            minutes_to_reach_target = 1.0",
            "",
        );
        assert!(config_from(&toml).is_err());
    }
}
