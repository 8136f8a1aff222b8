use super::{json_number, ServiceClient};
use crate::error::DashResult;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const SERVICE: &str = "PostHog";

/// Distinct visitors with a pageview since the start of the month
const MONTH_VISITORS_QUERY: &str =
    "select countDistinctIf(person_id, event = '$pageview' and timestamp >= toStartOfMonth(now())) from events";

/// Visitors this month grouped by country and region
const MONTH_REGIONS_QUERY: &str = "select properties.$geoip_country_code as country, properties.$geoip_region as region, \
     countDistinctIf(person_id, event = '$pageview' and timestamp >= toStartOfMonth(now())) as count \
     from events where properties.$geoip_country_code is not null and properties.$geoip_region is not null \
     group by country, region order by count desc limit 12";

/// Number of users returned by the per-user listings
const TOP_USERS: usize = 5;

/// Visitors in one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCount {
    pub country: String,
    pub region: String,
    pub count: u64,
}

/// Session count for one identified user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessions {
    pub email: String,
    pub sessions: u64,
}

/// LLM spend attributed to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub email: String,
    pub cost: f64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Value,
}

#[derive(Debug, Deserialize)]
struct TrendResponse {
    #[serde(default)]
    result: Vec<TrendSeries>,
}

#[derive(Debug, Deserialize)]
struct TrendSeries {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    #[serde(default)]
    results: Vec<Value>,
}

/// Client for the PostHog query, insights, events and persons APIs
#[derive(Debug, Clone)]
pub struct PostHogClient {
    api: ServiceClient,
    project_id: String,
}

impl PostHogClient {
    pub fn new(host: &str, api_key: &str, project_id: &str, http: Client) -> DashResult<Self> {
        Ok(Self {
            api: ServiceClient::new(SERVICE, host, api_key, http)?,
            project_id: project_id.to_string(),
        })
    }

    async fn hogql(&self, query: &str) -> DashResult<Value> {
        let body = json!({ "query": { "kind": "HogQLQuery", "query": query } });
        let response: QueryResponse = self
            .api
            .post_json(&["api", "projects", self.project_id.as_str(), "query", ""], &body)
            .await?;
        Ok(response.results)
    }

    /// Distinct visitors this month
    pub async fn month_visitors(&self) -> DashResult<u64> {
        let results = self.hogql(MONTH_VISITORS_QUERY).await?;
        Ok(parse_visitor_total(&results))
    }

    /// Top regions by visitors this month
    pub async fn month_regions(&self) -> DashResult<Vec<RegionCount>> {
        let results = self.hogql(MONTH_REGIONS_QUERY).await?;
        Ok(parse_region_rows(&results))
    }

    /// Users with the most sessions, leaving out internal accounts
    pub async fn sessions_per_user(&self, excluded: &[String]) -> DashResult<Vec<UserSessions>> {
        let results = self.hogql(&sessions_per_user_query(excluded)).await?;
        Ok(parse_session_rows(&results))
    }

    /// Fetch a pageview trend series, oldest point first
    pub async fn trend(&self, math: &str, date_from: &str, interval: &str) -> DashResult<Vec<f64>> {
        let body = json!({
            "events": [{
                "id": "$pageview",
                "name": "$pageview",
                "type": "events",
                "order": 0,
                "math": math,
            }],
            "date_from": date_from,
            "date_to": null,
            "interval": interval,
            "display": "ActionsLineGraph",
            "insight": "TRENDS",
            "breakdown_type": null,
            "properties": [],
            "filter_test_accounts": true,
        });
        let response: TrendResponse = self
            .api
            .post_json(&["api", "projects", self.project_id.as_str(), "insights", "trend", ""], &body)
            .await?;

        Ok(response
            .result
            .first()
            .map(|series| series.data.iter().filter_map(json_number).collect())
            .unwrap_or_default())
    }

    /// LLM cost per user across all `$ai_generation` events, top spenders first
    pub async fn llm_usage(&self) -> DashResult<Vec<UsageEntry>> {
        let query = [
            ("event", "$ai_generation".to_string()),
            ("date_from", "all".to_string()),
            ("limit", "1000".to_string()),
            ("order_by", "-timestamp".to_string()),
        ];
        let page: ResultsPage = self
            .api
            .get_json(&["api", "projects", self.project_id.as_str(), "events", ""], &query)
            .await?;
        debug!("Fetched {} AI generation events", page.results.len());

        let costs = costs_by_distinct_id(&page.results);
        let lookups = costs.keys().map(|id| async move {
            let email = self.person_email(id).await.unwrap_or_else(|| id.clone());
            (id.clone(), email)
        });
        let emails: HashMap<String, String> = join_all(lookups).await.into_iter().collect();

        Ok(usage_by_email(costs, &emails))
    }

    /// Resolve a distinct id to the person's email
    async fn person_email(&self, distinct_id: &str) -> Option<String> {
        let query = [("distinct_id", distinct_id.to_string())];
        match self
            .api
            .get_json::<ResultsPage>(&["api", "projects", self.project_id.as_str(), "persons", ""], &query)
            .await
        {
            Ok(page) => page.results.first().and_then(person_email_property),
            Err(e) => {
                warn!("Failed to fetch person {}: {}", distinct_id, e);
                None
            }
        }
    }
}

fn person_email_property(person: &Value) -> Option<String> {
    let properties = person.get("properties")?;
    properties
        .get("email")
        .or_else(|| properties.get("$email"))
        .and_then(Value::as_str)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
}

/// HogQL query for sessions per identified user
fn sessions_per_user_query(excluded: &[String]) -> String {
    let exclusion = if excluded.is_empty() {
        String::new()
    } else {
        let list = excluded
            .iter()
            .map(|email| format!("'{}'", email.replace('\\', "\\\\").replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(",");
        format!(" and coalesce(person.properties.$email, person.properties.email) not in ({})", list)
    };

    format!(
        "select coalesce(person.properties.$email, person.properties.email) as email, \
         countDistinctIf(properties.$session_id, properties.$session_id is not null) as sessions \
         from events where (person.properties.$email is not null or person.properties.email is not null){} \
         group by email order by sessions desc limit {}",
        exclusion, TOP_USERS
    )
}

/// Read a single-value query result, either `[[n]]` or a bare number
fn parse_visitor_total(results: &Value) -> u64 {
    let value = match results {
        Value::Array(rows) => rows.first().and_then(|row| row.get(0)).and_then(json_number),
        other => json_number(other),
    };
    value.unwrap_or(0.0).max(0.0) as u64
}

fn rows(results: &Value) -> &[Value] {
    results.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn parse_region_rows(results: &Value) -> Vec<RegionCount> {
    rows(results)
        .iter()
        .filter_map(|row| {
            let country = row.get(0)?.as_str().filter(|s| !s.is_empty())?;
            let region = row.get(1)?.as_str().filter(|s| !s.is_empty())?;
            let count = row.get(2).and_then(json_number).unwrap_or(0.0);
            Some(RegionCount {
                country: country.to_string(),
                region: region.to_string(),
                count: count as u64,
            })
        })
        .collect()
}

fn parse_session_rows(results: &Value) -> Vec<UserSessions> {
    rows(results)
        .iter()
        .filter_map(|row| {
            let email = row.get(0).and_then(Value::as_str).unwrap_or("unknown");
            if email == "unknown" {
                return None;
            }
            Some(UserSessions {
                email: email.to_string(),
                sessions: row.get(1).and_then(json_number).unwrap_or(0.0) as u64,
            })
        })
        .collect()
}

/// Cost of a single AI generation event in USD.
///
/// Tries the total cost, then the legacy cost properties, then input plus output cost.
fn event_cost(event: &Value) -> f64 {
    let Some(properties) = event.get("properties") else {
        return 0.0;
    };
    let number = |key: &str| properties.get(key).and_then(json_number);

    ["$ai_total_cost_usd", "$ai_cost", "cost"]
        .iter()
        .filter_map(|key| number(key))
        .find(|cost| *cost != 0.0)
        .or_else(|| match (number("$ai_input_cost_usd"), number("$ai_output_cost_usd")) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        })
        .unwrap_or(0.0)
}

fn costs_by_distinct_id(events: &[Value]) -> HashMap<String, f64> {
    let mut costs = HashMap::new();
    for event in events {
        let Some(id) = event.get("distinct_id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
            continue;
        };
        let cost = event_cost(event);
        if cost > 0.0 {
            *costs.entry(id.to_string()).or_insert(0.0) += cost;
        }
    }
    costs
}

/// Regroup per-id costs by resolved email and keep the top spenders
fn usage_by_email(costs: HashMap<String, f64>, emails: &HashMap<String, String>) -> Vec<UsageEntry> {
    let mut by_email: HashMap<String, f64> = HashMap::new();
    for (id, cost) in costs {
        let email = emails.get(&id).cloned().unwrap_or(id);
        *by_email.entry(email).or_insert(0.0) += cost;
    }

    let mut usage: Vec<UsageEntry> = by_email
        .into_iter()
        .map(|(email, cost)| UsageEntry { email, cost })
        .collect();
    usage.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.email.cmp(&b.email)));
    usage.truncate(TOP_USERS);
    usage
}

/// Latest value of a series and its percentage change from the previous point
pub fn latest_with_change(series: &[f64]) -> (f64, f64) {
    let current = series.last().copied().unwrap_or(0.0);
    let previous = if series.len() >= 2 { series[series.len() - 2] } else { 0.0 };
    let change = if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    };
    (current, change)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_total_shapes() {
        assert_eq!(parse_visitor_total(&json!([[1234]])), 1234);
        assert_eq!(parse_visitor_total(&json!(77)), 77);
        assert_eq!(parse_visitor_total(&json!([])), 0);
        assert_eq!(parse_visitor_total(&json!(null)), 0);
    }

    #[test]
    fn test_region_rows_drop_incomplete() {
        let regions = parse_region_rows(&json!([
            ["US", "MO", 40],
            ["US", null, 12],
            [null, "ON", 3],
            ["DE", "BE", "7"]
        ]));
        assert_eq!(
            regions,
            vec![
                RegionCount { country: "US".into(), region: "MO".into(), count: 40 },
                RegionCount { country: "DE".into(), region: "BE".into(), count: 7 },
            ]
        );
    }

    #[test]
    fn test_session_rows_drop_unknown() {
        let users = parse_session_rows(&json!([["a@example.com", 9], [null, 4], ["b@example.com", 2]]));
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "a@example.com");
        assert_eq!(users[0].sessions, 9);
    }

    #[test]
    fn test_sessions_query_excludes_emails() {
        let query = sessions_per_user_query(&["ops@example.com".to_string(), "o'neil@example.com".to_string()]);
        assert!(query.contains("not in ('ops@example.com','o\\'neil@example.com')"));
        assert!(query.ends_with("limit 5"));
        assert!(!sessions_per_user_query(&[]).contains("not in"));
    }

    #[test]
    fn test_event_cost_fallbacks() {
        assert_eq!(event_cost(&json!({"properties": {"$ai_total_cost_usd": 0.5}})), 0.5);
        assert_eq!(event_cost(&json!({"properties": {"$ai_cost": "0.25"}})), 0.25);
        assert_eq!(event_cost(&json!({"properties": {"$ai_total_cost_usd": 0, "cost": 0.1}})), 0.1);
        assert_eq!(
            event_cost(&json!({"properties": {"$ai_input_cost_usd": 0.1, "$ai_output_cost_usd": 0.2}})),
            0.1 + 0.2
        );
        assert_eq!(event_cost(&json!({"properties": {"$ai_input_cost_usd": 0.1}})), 0.0);
        assert_eq!(event_cost(&json!({})), 0.0);
    }

    #[test]
    fn test_usage_grouped_by_email() {
        let events = vec![
            json!({"distinct_id": "u1", "properties": {"$ai_total_cost_usd": 1.0}}),
            json!({"distinct_id": "u1", "properties": {"$ai_total_cost_usd": 2.0}}),
            json!({"distinct_id": "u2", "properties": {"$ai_total_cost_usd": 0.5}}),
            json!({"distinct_id": "u3", "properties": {"$ai_total_cost_usd": 4.0}}),
            json!({"properties": {"$ai_total_cost_usd": 9.0}}),
        ];
        let costs = costs_by_distinct_id(&events);
        assert_eq!(costs.len(), 3);

        // u1 and u2 are the same person
        let emails: HashMap<String, String> = [
            ("u1".to_string(), "dev@example.com".to_string()),
            ("u2".to_string(), "dev@example.com".to_string()),
        ]
        .into_iter()
        .collect();
        let usage = usage_by_email(costs, &emails);
        assert_eq!(usage[0], UsageEntry { email: "u3".into(), cost: 4.0 });
        assert_eq!(usage[1], UsageEntry { email: "dev@example.com".into(), cost: 3.5 });
    }

    #[test]
    fn test_latest_with_change() {
        assert_eq!(latest_with_change(&[100.0, 150.0]), (150.0, 50.0));
        assert_eq!(latest_with_change(&[0.0, 10.0]), (10.0, 0.0));
        assert_eq!(latest_with_change(&[42.0]), (42.0, 0.0));
        assert_eq!(latest_with_change(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_person_email_property() {
        assert_eq!(
            person_email_property(&json!({"properties": {"$email": "x@example.com"}})),
            Some("x@example.com".to_string())
        );
        assert_eq!(person_email_property(&json!({"properties": {}})), None);
    }
}
