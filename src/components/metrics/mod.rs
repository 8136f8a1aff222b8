//! Dashboard reports composed from several provider calls.

use crate::components::providers::posthog::{latest_with_change, RegionCount, UsageEntry};
use crate::components::providers::Providers;
use crate::error::DashResult;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// LLM spend per user and in total
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageReport {
    pub data: Vec<UsageEntry>,
    pub total: f64,
}

impl UsageReport {
    pub fn new(data: Vec<UsageEntry>) -> Self {
        let total = data.iter().map(|entry| entry.cost).sum();
        Self { data, total }
    }
}

/// One analytics card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsMetric {
    pub metric: String,
    pub value: u64,
    /// Rounded percentage change from the previous period
    pub change: i64,
    /// Icon name rendered next to the card
    pub icon: String,
}

impl AnalyticsMetric {
    fn from_series(metric: &str, icon: &str, series: &[f64]) -> Self {
        let (value, change) = latest_with_change(series);
        Self {
            metric: metric.to_string(),
            value: value.round().max(0.0) as u64,
            change: change.round() as i64,
            icon: icon.to_string(),
        }
    }
}

/// Analytics cards and visitor regions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub data: Vec<AnalyticsMetric>,
    pub regions: Vec<RegionCount>,
}

/// Stripe revenue summary
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    /// Annual recurring revenue in dollars
    pub arr: u64,
    /// Succeeded charges in dollars
    pub total_money_made: f64,
}

/// Top LLM spenders
pub async fn usage(providers: &Providers) -> DashResult<UsageReport> {
    let entries = providers.posthog()?.llm_usage().await?;
    let report = UsageReport::new(entries);
    info!("Usage report: {} users, total ${:.2}", report.data.len(), report.total);
    Ok(report)
}

/// Weekly active users, total users and monthly visitors
pub async fn analytics(providers: &Providers) -> DashResult<AnalyticsReport> {
    let posthog = providers.posthog()?;
    let clerk = providers.clerk()?;

    let (weekly, total_users, monthly) = tokio::try_join!(
        posthog.trend("weekly_active", "-14d", "week"),
        clerk.total_users(),
        posthog.trend("monthly_active", "-60d", "month"),
    )?;

    let regions = match posthog.month_regions().await {
        Ok(regions) => regions,
        Err(e) => {
            warn!("Failed to fetch visitor regions: {}", e);
            Vec::new()
        }
    };

    Ok(AnalyticsReport {
        data: analytics_cards(&weekly, total_users, &monthly),
        regions,
    })
}

fn analytics_cards(weekly: &[f64], total_users: u64, monthly: &[f64]) -> Vec<AnalyticsMetric> {
    vec![
        AnalyticsMetric::from_series("Weekly Active Users", "UserCheck", weekly),
        AnalyticsMetric {
            metric: "Total Users".to_string(),
            value: total_users,
            change: 0,
            icon: "Users".to_string(),
        },
        AnalyticsMetric::from_series("Website Visitors (30 days)", "MousePointer", monthly),
    ]
}

/// ARR and charges total, fetched concurrently
pub async fn revenue(providers: &Providers) -> DashResult<Revenue> {
    let stripe = providers.stripe()?;
    let (arr, total_money_made) = tokio::try_join!(stripe.annual_recurring_revenue(), stripe.succeeded_charges_total())?;
    Ok(Revenue { arr, total_money_made })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_usage_total() {
        let report = UsageReport::new(vec![
            UsageEntry {
                email: "a@example.com".to_string(),
                cost: 1.25,
            },
            UsageEntry {
                email: "b@example.com".to_string(),
                cost: 0.5,
            },
        ]);
        assert_eq!(report.total, 1.75);
    }

    #[test]
    fn test_analytics_cards() {
        let cards = analytics_cards(&[40.0, 50.0], 321, &[200.0, 150.0]);
        assert_eq!(cards.len(), 3);

        assert_eq!(cards[0].metric, "Weekly Active Users");
        assert_eq!(cards[0].value, 50);
        assert_eq!(cards[0].change, 25);

        assert_eq!(cards[1].value, 321);
        assert_eq!(cards[1].change, 0);
        assert_eq!(cards[1].icon, "Users");

        assert_eq!(cards[2].value, 150);
        assert_eq!(cards[2].change, -25);
    }

    #[test]
    fn test_card_without_history() {
        let cards = analytics_cards(&[], 0, &[12.0]);
        assert_eq!(cards[0].value, 0);
        assert_eq!(cards[0].change, 0);
        assert_eq!(cards[2].value, 12);
        assert_eq!(cards[2].change, 0);
    }

    #[test]
    fn test_revenue_wire_format() {
        let revenue = Revenue {
            arr: 1200,
            total_money_made: 99.5,
        };
        let json = serde_json::to_value(revenue).unwrap();
        assert_eq!(json["totalMoneyMade"], 99.5);
        assert_eq!(json["arr"], 1200);
    }

    #[tokio::test]
    async fn test_reports_need_configuration() {
        let providers = Providers::from_config(&Config::default()).unwrap();
        assert!(usage(&providers).await.is_err());
        assert!(analytics(&providers).await.is_err());
        let err = revenue(&providers).await.unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Missing STRIPE_SECRET_KEY");
    }
}
