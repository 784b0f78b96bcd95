//! Fully-resolved gateway requests.
//!
//! A [`RequestSpec`] carries everything the session needs to put a request on
//! the wire. Any coordinate not pinned by the caller (vendor, store, order id)
//! is filled with weighted/random data, the same way operators drive ad-hoc
//! runs.

use std::sync::Arc;

use rand::Rng;
use reqwest::Method;

use super::bodies::{
    StandardV1OrderBody, StandardV1ReleaseBody, UberV2OrderBody, UberV2ReleaseBody,
};
use super::ids;
use super::{TaskKind, WorkloadError};
use crate::config::BaseUrls;
use crate::domain::vendor::secret;
use crate::domain::{pick_vendor, Implementation, TargetEnv, Vendor, VendorProfile};

const DEFAULT_SUCCESS_STATUSES: [u16; 2] = [200, 201];

const ALL_VENDORS: [Vendor; 5] = [
    Vendor::Doordash,
    Vendor::Ubereats,
    Vendor::Grubhub,
    Vendor::Postmates,
    Vendor::Skipthedishes,
];

/// Vendors implementing an endpoint, with the alb listener port for each.
fn implementations(kind: TaskKind) -> &'static [(Vendor, u16)] {
    match kind {
        TaskKind::GetMenu => &[
            (Vendor::Doordash, 9019),
            (Vendor::Grubhub, 9025),
            (Vendor::Postmates, 9033),
        ],
        TaskKind::Order | TaskKind::Release => &[
            (Vendor::Doordash, 9020),
            (Vendor::Ubereats, 9002),
            (Vendor::Grubhub, 9026),
            (Vendor::Postmates, 9034),
            (Vendor::Skipthedishes, 9012),
        ],
        // Token generation bypasses the per-vendor listeners entirely.
        TaskKind::TokenGeneration => &[],
    }
}

fn route(kind: TaskKind, env: TargetEnv) -> Option<&'static str> {
    match (kind, env) {
        (TaskKind::GetMenu, TargetEnv::Perf) => Some("/{version}/vendors/{vendor}/menu/{store_id}"),
        (TaskKind::GetMenu, _) => Some("/{version}/stores/menu/{vendor}/{market}/{store_id}"),
        (TaskKind::Order, TargetEnv::Perf) => Some("/{version}/vendors/{vendor}/order"),
        (TaskKind::Order, _) => Some("/{version}/orders/{vendor}/{market}/{store_id}"),
        (TaskKind::Release, TargetEnv::Perf) => Some("/{version}/vendors/{vendor}/order/release"),
        (TaskKind::Release, _) => Some("/{version}/orders/release/{vendor}/{market}/{store_id}"),
        (TaskKind::TokenGeneration, _) => None,
    }
}

/// One request, resolved down to the bytes that go on the wire.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub kind: TaskKind,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub success_statuses: Vec<u16>,
    /// Stat-table key: `ENV_MARKET_KIND_VENDOR_VERSION`, uppercased.
    pub display_name: String,
    pub profile: Arc<VendorProfile>,
    pub store_id: Option<String>,
    pub order_id: Option<String>,
}

impl RequestSpec {
    pub fn bearer_token(&self) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    pub fn set_bearer_token(&mut self, token: &str) {
        for (name, value) in &mut self.headers {
            if name.as_str() == "Authorization" {
                *value = token.to_string();
            }
        }
    }
}

/// Builds [`RequestSpec`]s for the configured environment.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    env: TargetEnv,
    base_urls: BaseUrls,
}

impl RequestFactory {
    pub fn new(env: TargetEnv, base_urls: BaseUrls) -> Self {
        Self { env, base_urls }
    }

    /// Token request against the auth endpoint. Tokens are always minted by
    /// the perf deployment, whatever environment the tasks target.
    pub fn token_generation(
        &self,
        rng: &mut impl Rng,
        profile: Option<Arc<VendorProfile>>,
    ) -> Result<RequestSpec, WorkloadError> {
        let profile = match profile {
            Some(p) => p,
            None => pick_vendor(rng, &ALL_VENDORS).ok_or(WorkloadError::NoVendorAvailable {
                endpoint: TaskKind::TokenGeneration,
            })?,
        };
        Ok(self.token_generation_for(profile))
    }

    pub fn token_generation_for(&self, profile: Arc<VendorProfile>) -> RequestSpec {
        let base = self.base_urls.perf.trim_end_matches('/');
        let (url, content_type, body) = match profile.implementation {
            Implementation::Standard => (
                format!("{base}/security/auth/token"),
                "application/x-www-form-urlencoded",
                "grantType=client_credentials".to_string(),
            ),
            Implementation::Uber => (
                format!("{base}/v1/vendor/authentication"),
                "application/json",
                serde_json::json!({
                    "username": secret("UBER_USERNAME", "perf-loadtest"),
                    "password": secret("UBER_PASSWORD", "perf-loadtest"),
                })
                .to_string(),
            ),
        };
        RequestSpec {
            kind: TaskKind::TokenGeneration,
            method: Method::POST,
            url,
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("tpo-clientid".to_string(), profile.client_id.clone()),
                ("tpo-marketid".to_string(), profile.market.to_string()),
                ("Authorization".to_string(), profile.basic_token.clone()),
            ],
            body,
            success_statuses: DEFAULT_SUCCESS_STATUSES.to_vec(),
            display_name: self.display_name(TaskKind::TokenGeneration, &profile),
            profile,
            store_id: None,
            order_id: None,
        }
    }

    pub fn get_menu(
        &self,
        rng: &mut impl Rng,
        profile: Option<Arc<VendorProfile>>,
    ) -> Result<RequestSpec, WorkloadError> {
        let profile = self.resolve_profile(rng, TaskKind::GetMenu, profile)?;
        let store_id = self.random_store(rng, &profile);
        let url = self.resolve_url(TaskKind::GetMenu, &profile, &store_id)?;
        Ok(RequestSpec {
            kind: TaskKind::GetMenu,
            method: Method::GET,
            url,
            headers: self.default_headers(&profile),
            body: String::new(),
            success_statuses: DEFAULT_SUCCESS_STATUSES.to_vec(),
            display_name: self.display_name(TaskKind::GetMenu, &profile),
            profile,
            store_id: Some(store_id),
            order_id: None,
        })
    }

    pub fn order(
        &self,
        rng: &mut impl Rng,
        profile: Option<Arc<VendorProfile>>,
    ) -> Result<RequestSpec, WorkloadError> {
        let profile = self.resolve_profile(rng, TaskKind::Order, profile)?;
        let store_id = self.random_store(rng, &profile);
        let order_id = ids::random_order_id();
        let url = self.resolve_url(TaskKind::Order, &profile, &store_id)?;
        let body = order_body(&profile, &store_id, &order_id)?;
        Ok(RequestSpec {
            kind: TaskKind::Order,
            method: Method::POST,
            url,
            headers: self.default_headers(&profile),
            body,
            success_statuses: DEFAULT_SUCCESS_STATUSES.to_vec(),
            display_name: self.display_name(TaskKind::Order, &profile),
            profile,
            store_id: Some(store_id),
            order_id: Some(order_id),
        })
    }

    /// Release for a specific submitted order; built at order time and queued
    /// until the release delay has passed.
    pub fn release_for(
        &self,
        profile: Arc<VendorProfile>,
        store_id: String,
        order_id: String,
    ) -> Result<RequestSpec, WorkloadError> {
        self.check_implemented(TaskKind::Release, &profile)?;
        let url = self.resolve_url(TaskKind::Release, &profile, &store_id)?;
        let body = release_body(&profile, &store_id, &order_id)?;
        Ok(RequestSpec {
            kind: TaskKind::Release,
            method: Method::POST,
            url,
            headers: self.default_headers(&profile),
            body,
            success_statuses: DEFAULT_SUCCESS_STATUSES.to_vec(),
            display_name: self.display_name(TaskKind::Release, &profile),
            profile,
            store_id: Some(store_id),
            order_id: Some(order_id),
        })
    }

    fn resolve_profile(
        &self,
        rng: &mut impl Rng,
        kind: TaskKind,
        profile: Option<Arc<VendorProfile>>,
    ) -> Result<Arc<VendorProfile>, WorkloadError> {
        match profile {
            Some(p) => {
                self.check_implemented(kind, &p)?;
                Ok(p)
            }
            None => {
                let allowed: Vec<Vendor> =
                    implementations(kind).iter().map(|(v, _)| *v).collect();
                pick_vendor(rng, &allowed)
                    .ok_or(WorkloadError::NoVendorAvailable { endpoint: kind })
            }
        }
    }

    fn check_implemented(
        &self,
        kind: TaskKind,
        profile: &VendorProfile,
    ) -> Result<(), WorkloadError> {
        if implementations(kind).iter().any(|(v, _)| *v == profile.vendor) {
            Ok(())
        } else {
            Err(WorkloadError::EndpointNotImplemented {
                endpoint: kind,
                vendor: profile.vendor,
            })
        }
    }

    fn random_store(&self, rng: &mut impl Rng, profile: &VendorProfile) -> String {
        let store_id = ids::random_store_id(rng, profile.market);
        if profile.uses_store_uuid {
            ids::store_uuid(&store_id)
        } else {
            store_id
        }
    }

    fn resolve_url(
        &self,
        kind: TaskKind,
        profile: &VendorProfile,
        store_id: &str,
    ) -> Result<String, WorkloadError> {
        let route = route(kind, self.env).ok_or(WorkloadError::RouteNotAvailable {
            endpoint: kind,
            environment: self.env,
        })?;
        let port = implementations(kind)
            .iter()
            .find(|(v, _)| *v == profile.vendor)
            .map(|(_, port)| *port)
            .unwrap_or_default();
        let raw = format!("{}{}", self.base_urls.for_env(self.env).trim_end_matches('/'), route);
        Ok(raw
            .replace("{market}", &profile.market.to_string())
            .replace("{version}", &profile.version.to_string())
            .replace("{vendor}", &profile.vendor.to_string())
            .replace("{store_id}", store_id)
            .replace("{port}", &port.to_string()))
    }

    fn default_headers(&self, profile: &VendorProfile) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("tpo-clientid".to_string(), profile.client_id.clone()),
            ("tpo-marketid".to_string(), profile.market.to_string()),
            ("tpo-uuid".to_string(), profile.client_uuid.clone()),
            ("Authorization".to_string(), profile.bearer_token()),
        ]
    }

    fn display_name(&self, kind: TaskKind, profile: &VendorProfile) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.env,
            profile.market,
            kind.stat_fragment(),
            profile.vendor,
            profile.version
        )
        .to_uppercase()
    }
}

fn order_body(
    profile: &VendorProfile,
    store_id: &str,
    order_id: &str,
) -> Result<String, WorkloadError> {
    match (profile.implementation, profile.version) {
        (Implementation::Standard, crate::domain::ApiVersion::V1) => {
            Ok(serde_json::to_string(&StandardV1OrderBody::new(store_id, order_id))?)
        }
        (Implementation::Uber, crate::domain::ApiVersion::V2) => {
            Ok(serde_json::to_string(&UberV2OrderBody::new(store_id, order_id))?)
        }
        (implementation, version) => Err(WorkloadError::BodyNotAvailable {
            endpoint: TaskKind::Order,
            implementation,
            version,
        }),
    }
}

fn release_body(
    profile: &VendorProfile,
    store_id: &str,
    order_id: &str,
) -> Result<String, WorkloadError> {
    match (profile.implementation, profile.version) {
        (Implementation::Standard, crate::domain::ApiVersion::V1) => {
            Ok(serde_json::to_string(&StandardV1ReleaseBody {
                store_id: store_id.to_string(),
                order_id: order_id.to_string(),
            })?)
        }
        (Implementation::Uber, crate::domain::ApiVersion::V2) => {
            Ok(serde_json::to_string(&UberV2ReleaseBody {
                store_id: store_id.to_string(),
                order_id: order_id.to_string(),
            })?)
        }
        (implementation, version) => Err(WorkloadError::BodyNotAvailable {
            endpoint: TaskKind::Release,
            implementation,
            version,
        }),
    }
}
