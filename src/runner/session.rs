//! Puts [`RequestSpec`]s on the wire and owns the bearer-token lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::{json, Value};
use tracing::warn;

use super::stats::StatsRegistry;
use crate::config::Config;
use crate::domain::{Implementation, TargetEnv, BEARER_PLACEHOLDER};
use crate::workload::{RequestFactory, RequestSpec, TaskKind};

/// A shared HTTP session. Cheap to clone behind an `Arc`; every worker sends
/// through the same connection pool.
pub struct Session {
    client: reqwest::Client,
    env: TargetEnv,
    use_global_tokens: bool,
    factory: Arc<RequestFactory>,
    stats: Arc<StatsRegistry>,
}

impl Session {
    pub fn new(
        cfg: &Config,
        factory: Arc<RequestFactory>,
        stats: Arc<StatsRegistry>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            env: cfg.target.environment,
            use_global_tokens: cfg.auth.use_global_tokens,
            factory,
            stats,
        })
    }

    /// Sends `spec`, transparently handling auth:
    ///
    /// 1. On perf, a spec still carrying the placeholder token gets a real one
    ///    first.
    /// 2. A response that signals an expired/invalid token triggers one token
    ///    refresh and one resend, never more.
    ///
    /// Always returns the response body as JSON; a non-JSON body is wrapped as
    /// `{"code", "text"}` and counted as a failure. Transport errors are
    /// wrapped the same way with code 0.
    pub async fn send(&self, spec: &mut RequestSpec) -> Value {
        if self.token_required(spec) {
            self.refresh_token(spec).await;
        }

        let mut refreshed = false;
        loop {
            let (elapsed, attempt) = self.execute(spec).await;
            let (status, text) = match attempt {
                Ok(ok) => ok,
                Err(err) => {
                    let wrapped = json!({ "code": 0, "text": err.to_string() });
                    self.stats
                        .record(&spec.display_name, elapsed, Some(wrapped.to_string()));
                    return wrapped;
                }
            };

            if !refreshed && self.token_expired(spec, status, &text) {
                // The stale-token attempt still counts as traffic, not failure.
                self.stats.record(&spec.display_name, elapsed, None);
                self.refresh_token(spec).await;
                refreshed = true;
                continue;
            }

            return self.classify_and_record(spec, status, text, elapsed);
        }
    }

    fn token_required(&self, spec: &RequestSpec) -> bool {
        self.env == TargetEnv::Perf
            && spec.kind != TaskKind::TokenGeneration
            && spec.bearer_token() == BEARER_PLACEHOLDER
    }

    fn token_expired(&self, spec: &RequestSpec, status: u16, text: &str) -> bool {
        if spec.kind == TaskKind::TokenGeneration {
            return false;
        }
        let standard_expired =
            text.contains("Token is expired") || text.contains("Invalid authorization token");
        let uber_expired = spec.profile.implementation == Implementation::Uber
            && status == 500
            && text.is_empty();
        standard_expired || uber_expired
    }

    /// Generates a fresh token for the request's vendor and installs it on
    /// the request (and, with global tokens enabled, on the shared profile).
    async fn refresh_token(&self, spec: &mut RequestSpec) {
        let token_spec = self.factory.token_generation_for(Arc::clone(&spec.profile));
        let (elapsed, attempt) = self.execute(&token_spec).await;
        let value = match attempt {
            Ok((status, text)) => self.classify_and_record(&token_spec, status, text, elapsed),
            Err(err) => {
                let wrapped = json!({ "code": 0, "text": err.to_string() });
                self.stats
                    .record(&token_spec.display_name, elapsed, Some(wrapped.to_string()));
                wrapped
            }
        };

        match value.get("token").and_then(Value::as_str) {
            Some(token) => {
                let bearer = format!("Bearer {token}");
                spec.set_bearer_token(&bearer);
                if self.use_global_tokens {
                    spec.profile.set_bearer_token(&bearer);
                }
            }
            None => warn!(
                endpoint = %token_spec.display_name,
                "token generation returned no token"
            ),
        }
    }

    async fn execute(&self, spec: &RequestSpec) -> (Duration, Result<(u16, String), reqwest::Error>) {
        let mut request = self.client.request(spec.method.clone(), &spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !spec.body.is_empty() {
            request = request.body(spec.body.clone());
        }

        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(text) => Ok((status, text)),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        };
        (started.elapsed(), outcome)
    }

    /// Parses the body, applies the failure rules, records the sample, and
    /// returns the body as JSON.
    fn classify_and_record(
        &self,
        spec: &RequestSpec,
        status: u16,
        text: String,
        elapsed: Duration,
    ) -> Value {
        let (value, mut failure) = match serde_json::from_str::<Value>(&text) {
            Ok(value) => (value, None),
            Err(_) => {
                let wrapped = json!({ "code": status, "text": text });
                (wrapped.clone(), Some(wrapped.to_string()))
            }
        };

        if failure.is_none() && self.request_failed(spec, status, &value) {
            failure = Some(value.to_string());
        }

        self.stats.record(&spec.display_name, elapsed, failure);
        value
    }

    fn request_failed(&self, spec: &RequestSpec, status: u16, value: &Value) -> bool {
        (spec.kind == TaskKind::TokenGeneration && value.get("token").is_none())
            || !spec.success_statuses.contains(&status)
    }
}
