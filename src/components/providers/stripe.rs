use super::ServiceClient;
use crate::error::DashResult;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

const SERVICE: &str = "Stripe";
const BASE_URL: &str = "https://api.stripe.com/v1";
const PAGE_SIZE: usize = 100;

/// A page of a Stripe list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    #[serde(default)]
    pub id: String,
    pub unit_amount: Option<i64>,
    pub unit_amount_decimal: Option<String>,
    pub recurring: Option<Recurring>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub items: List<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub amount: i64,
    pub status: String,
}

/// How many billing periods of an interval fit in a year
fn interval_multiplier(interval: &str) -> u32 {
    match interval {
        "day" => 365,
        "week" => 52,
        "month" => 12,
        "year" => 1,
        _ => 0,
    }
}

/// Unit amount in cents, falling back to the decimal representation
fn unit_amount(price: &Price) -> f64 {
    match (price.unit_amount, &price.unit_amount_decimal) {
        (Some(amount), _) => amount as f64,
        (None, Some(decimal)) => decimal.parse::<f64>().unwrap_or(0.0),
        (None, None) => 0.0,
    }
}

/// Annualized value of one subscription item, in cents
fn item_arr_cents(item: &SubscriptionItem) -> f64 {
    let Some(recurring) = &item.price.recurring else {
        return 0.0;
    };
    let multiplier = interval_multiplier(&recurring.interval);
    unit_amount(&item.price) * item.quantity.unwrap_or(1) as f64 * multiplier as f64
}

/// Annualized value of every item of every subscription, in cents
pub fn arr_cents(subscriptions: &[Subscription]) -> f64 {
    subscriptions
        .iter()
        .flat_map(|s| s.items.data.iter())
        .map(item_arr_cents)
        .sum()
}

/// Sum of succeeded charges, in dollars rounded to cents
pub fn succeeded_total(charges: &[Charge]) -> f64 {
    let cents: i64 = charges
        .iter()
        .filter(|c| c.status == "succeeded")
        .map(|c| c.amount)
        .sum();
    (cents as f64).round() / 100.0
}

/// Client for the Stripe REST API
#[derive(Debug, Clone)]
pub struct StripeClient {
    api: ServiceClient,
}

impl StripeClient {
    pub fn new(secret_key: &str, http: Client) -> DashResult<Self> {
        Ok(Self {
            api: ServiceClient::new(SERVICE, BASE_URL, secret_key, http)?,
        })
    }

    /// Every active subscription, following pagination
    pub async fn active_subscriptions(&self) -> DashResult<Vec<Subscription>> {
        let mut subscriptions = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("status", "active".to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("expand[]", "data.items.data.price".to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let page: List<Subscription> = self.api.get_json(&["subscriptions"], &query).await?;
            let has_more = page.has_more;
            starting_after = page.data.last().map(|s| s.id.clone());
            subscriptions.extend(page.data);

            if !has_more || starting_after.is_none() {
                break;
            }
        }

        debug!("Fetched {} active subscriptions", subscriptions.len());
        Ok(subscriptions)
    }

    /// Annual recurring revenue in whole dollars
    pub async fn annual_recurring_revenue(&self) -> DashResult<u64> {
        let subscriptions = self.active_subscriptions().await?;
        let cents = arr_cents(&subscriptions);
        info!("Stripe ARR: {} subscriptions, {} cents", subscriptions.len(), cents);
        Ok((cents / 100.0).round().max(0.0) as u64)
    }

    /// Total of the latest succeeded charges in dollars
    pub async fn succeeded_charges_total(&self) -> DashResult<f64> {
        let query = [("limit", PAGE_SIZE.to_string())];
        let page: List<Charge> = self.api.get_json(&["charges"], &query).await?;
        Ok(succeeded_total(&page.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscriptions() -> Vec<Subscription> {
        serde_json::from_value(json!([
            {
                "id": "sub_1",
                "items": {"data": [
                    {"quantity": 2, "price": {"id": "p_m", "unit_amount": 1000, "recurring": {"interval": "month"}}},
                    {"quantity": null, "price": {"id": "p_y", "unit_amount": 50000, "recurring": {"interval": "year"}}}
                ]}
            },
            {
                "id": "sub_2",
                "items": {"data": [
                    {"price": {"id": "p_w", "unit_amount": null, "unit_amount_decimal": "250.5", "recurring": {"interval": "week"}}},
                    {"price": {"id": "p_once", "unit_amount": 9999, "recurring": null}},
                    {"price": {"id": "p_odd", "unit_amount": 100, "recurring": {"interval": "fortnight"}}}
                ]}
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_arr_annualizes_each_item() {
        // 1000*2*12 + 50000*1 + 250.5*52
        assert_eq!(arr_cents(&subscriptions()), 24000.0 + 50000.0 + 13026.0);
    }

    #[test]
    fn test_interval_multipliers() {
        assert_eq!(interval_multiplier("day"), 365);
        assert_eq!(interval_multiplier("week"), 52);
        assert_eq!(interval_multiplier("month"), 12);
        assert_eq!(interval_multiplier("year"), 1);
        assert_eq!(interval_multiplier("decade"), 0);
    }

    #[test]
    fn test_succeeded_total() {
        let charges: Vec<Charge> = serde_json::from_value(json!([
            {"amount": 1999, "status": "succeeded"},
            {"amount": 500, "status": "failed"},
            {"amount": 1, "status": "succeeded"}
        ]))
        .unwrap();
        assert_eq!(succeeded_total(&charges), 20.0);
    }

    #[test]
    fn test_subscription_clone_keeps_items() {
        let original = subscriptions().remove(0);
        let copy = original.clone();
        assert_eq!(copy.id, "sub_1");
        assert_eq!(copy.items.data.len(), original.items.data.len());
        assert_eq!(copy.items.data[0].price.id, "p_m");
        assert_eq!(arr_cents(&[copy]), arr_cents(&[original]));
    }

    #[test]
    fn test_list_defaults() {
        let page: List<Charge> = serde_json::from_value(json!({"object": "list"})).unwrap();
        assert!(page.data.is_empty());
        assert!(!page.has_more);
    }
}
