use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use uuid::Uuid;

use super::types::{ApiVersion, Implementation, Market, Vendor};

/// Every profile starts with this token. It satisfies the alb/nlb gateways
/// as-is; on perf it must be swapped for a real token before a task request
/// goes out.
pub const BEARER_PLACEHOLDER: &str = "Bearer placeholder";

/// A vendor integration plus everything needed to build its requests.
///
/// The bearer token is shared mutable state: with `auth.use_global_tokens`
/// enabled, one worker's freshly generated token is visible to every other
/// worker picking the same profile.
#[derive(Debug)]
pub struct VendorProfile {
    pub vendor: Vendor,
    pub market: Market,
    /// Relative probability of this profile being picked for a task.
    pub weight: u32,
    pub client_id: String,
    pub client_uuid: String,
    pub implementation: Implementation,
    /// Whether this vendor addresses stores by UUIDv5 instead of plain number.
    pub uses_store_uuid: bool,
    pub version: ApiVersion,
    /// Credential for the token endpoint (standard flavor only).
    pub basic_token: String,
    bearer_token: RwLock<String>,
}

impl VendorProfile {
    pub fn bearer_token(&self) -> String {
        self.bearer_token.read().clone()
    }

    pub fn set_bearer_token(&self, token: &str) {
        *self.bearer_token.write() = token.to_string();
    }
}

/// Reads `TPO_VENDOR_<name>` from the environment, falling back to a
/// placeholder. Real credentials never live in the source tree.
pub(crate) fn secret(name: &str, default: &str) -> String {
    std::env::var(format!("TPO_VENDOR_{name}")).unwrap_or_else(|_| default.to_string())
}

fn profile(
    vendor: Vendor,
    market: Market,
    implementation: Implementation,
    version: ApiVersion,
    uses_store_uuid: bool,
) -> Arc<VendorProfile> {
    let key = format!("{vendor}_{market}").to_uppercase();
    let basic_token = match implementation {
        // Uber authenticates with a JSON username/password body instead.
        Implementation::Uber => String::new(),
        Implementation::Standard => secret(&format!("{key}_BASIC_TOKEN"), "Basic placeholder"),
    };
    Arc::new(VendorProfile {
        vendor,
        market,
        weight: 1,
        client_id: secret(&format!("{key}_CLIENT_ID"), &format!("{vendor}-{market}-client")),
        client_uuid: secret(
            &format!("{key}_CLIENT_UUID"),
            &Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
        ),
        implementation,
        uses_store_uuid,
        version,
        basic_token,
        bearer_token: RwLock::new(BEARER_PLACEHOLDER.to_string()),
    })
}

/// The vendor integrations under test, one profile per (vendor, market) pair.
static VENDOR_CATALOG: Lazy<Vec<Arc<VendorProfile>>> = Lazy::new(|| {
    use ApiVersion::*;
    use Implementation::*;
    use Market::*;
    use Vendor::*;
    vec![
        profile(Doordash, Us, Standard, V1, false),
        profile(Ubereats, Us, Uber, V2, true),
        profile(Grubhub, Us, Standard, V1, false),
        profile(Postmates, Us, Standard, V1, true),
        profile(Doordash, Ca, Standard, V1, false),
        profile(Ubereats, Ca, Uber, V2, true),
        profile(Skipthedishes, Ca, Standard, V1, false),
    ]
});

pub fn catalog() -> &'static [Arc<VendorProfile>] {
    &VENDOR_CATALOG
}

/// Weighted pick among catalog profiles whose vendor is in `allowed`.
/// `None` when no allowed profile has positive weight.
pub fn pick_vendor(rng: &mut impl Rng, allowed: &[Vendor]) -> Option<Arc<VendorProfile>> {
    let candidates: Vec<&Arc<VendorProfile>> = catalog()
        .iter()
        .filter(|p| allowed.contains(&p.vendor))
        .collect();
    let dist = WeightedIndex::new(candidates.iter().map(|p| p.weight)).ok()?;
    Some(Arc::clone(candidates[dist.sample(rng)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn catalog_covers_both_markets() {
        assert_eq!(catalog().len(), 7);
        assert!(catalog().iter().any(|p| p.market == Market::Us));
        assert!(catalog().iter().any(|p| p.market == Market::Ca));
    }

    #[test]
    fn uber_profiles_use_v2_and_store_uuids() {
        for p in catalog().iter().filter(|p| p.vendor == Vendor::Ubereats) {
            assert_eq!(p.implementation, Implementation::Uber);
            assert_eq!(p.version, ApiVersion::V2);
            assert!(p.uses_store_uuid);
            assert!(p.basic_token.is_empty());
        }
    }

    #[test]
    fn pick_respects_allowed_set() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let p = pick_vendor(&mut rng, &[Vendor::Doordash, Vendor::Grubhub]).unwrap();
            assert!(matches!(p.vendor, Vendor::Doordash | Vendor::Grubhub));
        }
    }

    #[test]
    fn pick_with_no_candidates_is_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_vendor(&mut rng, &[]).is_none());
    }

    #[test]
    fn bearer_token_starts_as_placeholder_and_is_shared() {
        let p = profile(
            Vendor::Doordash,
            Market::Us,
            Implementation::Standard,
            ApiVersion::V1,
            false,
        );
        assert_eq!(p.bearer_token(), BEARER_PLACEHOLDER);
        p.set_bearer_token("Bearer abc");
        assert_eq!(p.bearer_token(), "Bearer abc");
    }
}
