//! Random identifiers the gateway endpoints expect.

use rand::Rng;
use uuid::Uuid;

use crate::domain::{Market, MIN_STORE_NUMBER};

/// Namespace for deriving store UUIDs from plain store numbers. Vendors
/// flagged `uses_store_uuid` address stores by `uuidv5(namespace, store_id)`.
pub const STORE_ID_NAMESPACE: Uuid = uuid::uuid!("6e0278cb-2716-4f1e-9fa4-4b3c6a3a3a52");

/// Draws a store number valid for `market`; ids below `MIN_STORE_NUMBER` are
/// reserved and never produced.
pub fn random_store_id(rng: &mut impl Rng, market: Market) -> String {
    rng.gen_range(MIN_STORE_NUMBER..=market.max_store_number())
        .to_string()
}

/// Deterministic UUIDv5 form of a store id.
pub fn store_uuid(store_id: &str) -> String {
    Uuid::new_v5(&STORE_ID_NAMESPACE, store_id.as_bytes()).to_string()
}

pub fn random_order_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn store_ids_stay_inside_market_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let id: u32 = random_store_id(&mut rng, Market::Ca).parse().unwrap();
            assert!((MIN_STORE_NUMBER..=Market::Ca.max_store_number()).contains(&id));
        }
    }

    #[test]
    fn store_uuid_is_deterministic() {
        assert_eq!(store_uuid("1234"), store_uuid("1234"));
        assert_ne!(store_uuid("1234"), store_uuid("1235"));
        // UUIDv5 marker digit.
        assert_eq!(store_uuid("1234").as_bytes()[14], b'5');
    }

    #[test]
    fn order_ids_are_unique() {
        assert_ne!(random_order_id(), random_order_id());
    }
}
