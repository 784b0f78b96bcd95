//! Wire bodies for order submission and release, per integration flavor.
//!
//! Field names are the gateway's, not ours — the Uber V2 release body really
//! does capitalize its keys.

use chrono::Local;
use serde::Serialize;

fn order_time() -> String {
    format!("{} 16:23:48", Local::now().date_naive())
}

// ============================================================================
// Standard V1
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StandardV1OrderItem {
    pub external_data: String,
    pub item_id: String,
    pub quantity: u32,
    pub price: f64,
}

impl Default for StandardV1OrderItem {
    fn default() -> Self {
        Self {
            external_data: "5".to_string(),
            item_id: "1006182".to_string(),
            quantity: 1,
            price: 3.19,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StandardV1OrderBody {
    pub store_id: String,
    pub order_id: String,
    pub order_short_code: String,
    pub rider_name: String,
    pub order_time: String,
    pub currency: String,
    pub total_amount: f64,
    pub order_items: Vec<StandardV1OrderItem>,
}

impl StandardV1OrderBody {
    pub fn new(store_id: &str, order_id: &str) -> Self {
        Self {
            store_id: store_id.to_string(),
            order_id: order_id.to_string(),
            order_short_code: "13b4c".to_string(),
            rider_name: "Gordon Ramsay".to_string(),
            order_time: order_time(),
            currency: "USD".to_string(),
            total_amount: 3.19,
            order_items: vec![StandardV1OrderItem::default()],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StandardV1ReleaseBody {
    pub store_id: String,
    pub order_id: String,
}

// ============================================================================
// Uber V2
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UberV2OrderItem {
    pub quantity: u32,
    pub price: f64,
    pub tax: f64,
    pub external_id: String,
}

impl Default for UberV2OrderItem {
    fn default() -> Self {
        Self {
            quantity: 1,
            price: 0.0,
            tax: 0.0,
            external_id: "PLU|7346".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UberV2OrderBody {
    pub store_id: String,
    pub order_id: String,
    pub order_number: String,
    pub order_time: String,
    pub total_amount: f64,
    pub total_tax: f64,
    pub order_items: Vec<UberV2OrderItem>,
}

impl UberV2OrderBody {
    pub fn new(store_id: &str, order_id: &str) -> Self {
        Self {
            store_id: store_id.to_string(),
            order_id: order_id.to_string(),
            order_number: "12345".to_string(),
            order_time: order_time(),
            total_amount: 0.0,
            total_tax: 0.0,
            order_items: vec![UberV2OrderItem::default()],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UberV2ReleaseBody {
    #[serde(rename = "StoreId")]
    pub store_id: String,
    #[serde(rename = "OrderId")]
    pub order_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn standard_order_body_shape() {
        let body = StandardV1OrderBody::new("123", "abc");
        let v: Value = serde_json::to_value(&body).unwrap();
        assert_eq!(v["store_id"], "123");
        assert_eq!(v["order_id"], "abc");
        assert_eq!(v["currency"], "USD");
        assert_eq!(v["order_items"][0]["item_id"], "1006182");
    }

    #[test]
    fn uber_release_body_capitalizes_keys() {
        let body = UberV2ReleaseBody {
            store_id: "123".to_string(),
            order_id: "abc".to_string(),
        };
        let v: Value = serde_json::to_value(&body).unwrap();
        assert_eq!(v["StoreId"], "123");
        assert_eq!(v["OrderId"], "abc");
        assert!(v.get("store_id").is_none());
    }

    #[test]
    fn order_time_matches_gateway_format() {
        let t = order_time();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(t.len(), 19);
        assert!(t.ends_with("16:23:48"));
    }
}
