use super::ServiceClient;
use crate::error::{provider_error, DashResult};
use crate::utils::time::{month_boundaries, MonthBounds};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SERVICE: &str = "Clerk";
const BASE_URL: &str = "https://api.clerk.com/v1";

/// Page size used when walking the user list
const PAGE_SIZE: usize = 100;
/// Users fetched for the recent signups list
const RECENT_FETCH: usize = 20;
/// Users shown in the recent signups list
const RECENT_SHOWN: usize = 5;
/// Sample size logged by the monthly tally
const LOG_SAMPLE: usize = 25;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub email_address: String,
}

/// The fields of a Clerk user the dashboard reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClerkUser {
    #[serde(default)]
    pub id: String,
    /// Creation time in milliseconds since the epoch
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
}

impl ClerkUser {
    /// Primary email, or `unknown`
    pub fn primary_email(&self) -> &str {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct UserCount {
    #[serde(default)]
    total_count: Option<u64>,
}

/// Signups in the current and previous UTC month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthUsers {
    pub total: u64,
    pub previous_total: u64,
}

/// Running state of the monthly signup count
#[derive(Debug, Default)]
struct MonthTally {
    counts: MonthUsers,
    pages: usize,
    sample: Vec<(String, i64, &'static str)>,
}

impl MonthTally {
    /// Count one page of users, newest first.
    ///
    /// Returns `false` once the page reaches users older than the previous month.
    fn add_page(&mut self, users: &[ClerkUser], bounds: &MonthBounds) -> bool {
        let current_start = bounds.current_start.timestamp_millis();
        let previous_start = bounds.previous_start.timestamp_millis();
        self.pages += 1;

        for user in users {
            let bucket = if user.created_at >= current_start {
                self.counts.total += 1;
                "current"
            } else if user.created_at >= previous_start {
                self.counts.previous_total += 1;
                "previous"
            } else {
                "older"
            };
            if self.sample.len() < LOG_SAMPLE {
                self.sample
                    .push((user.primary_email().to_string(), user.created_at, bucket));
            }
        }

        match users.last() {
            Some(last) => last.created_at >= previous_start,
            None => false,
        }
    }
}

/// Client for the Clerk backend API
#[derive(Debug, Clone)]
pub struct ClerkClient {
    api: ServiceClient,
}

impl ClerkClient {
    pub fn new(secret_key: &str, http: Client) -> DashResult<Self> {
        Ok(Self {
            api: ServiceClient::new(SERVICE, BASE_URL, secret_key, http)?,
        })
    }

    /// Total number of users
    pub async fn total_users(&self) -> DashResult<u64> {
        let count: UserCount = self.api.get_json(&["users", "count"], &[]).await?;
        Ok(count.total_count.unwrap_or(0))
    }

    /// One page of users, newest first
    pub async fn user_page(&self, limit: usize, offset: usize) -> DashResult<Vec<ClerkUser>> {
        let query = [
            ("order_by", "-created_at".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        self.api.get_json(&["users"], &query).await
    }

    /// Latest signups, lowercased, without internal accounts
    pub async fn recent_users(&self, excluded: &[String]) -> DashResult<Vec<String>> {
        let users = self.user_page(RECENT_FETCH, 0).await?;
        Ok(recent_emails(&users, excluded))
    }

    /// Signups this month and last month
    pub async fn month_users(&self, now: DateTime<Utc>) -> DashResult<MonthUsers> {
        let bounds = month_boundaries(&now).ok_or_else(|| provider_error(SERVICE, "Could not compute month boundaries"))?;
        let mut tally = MonthTally::default();
        let mut offset = 0;

        loop {
            let users = self.user_page(PAGE_SIZE, offset).await?;
            if users.is_empty() || !tally.add_page(&users, &bounds) {
                break;
            }
            offset += PAGE_SIZE;
        }

        info!(
            "Clerk month users: current={} previous={} pages={}",
            tally.counts.total, tally.counts.previous_total, tally.pages
        );
        debug!("Clerk month users sample: {:?}", tally.sample);

        Ok(tally.counts)
    }
}

fn recent_emails(users: &[ClerkUser], excluded: &[String]) -> Vec<String> {
    users
        .iter()
        .map(|user| user.primary_email().to_lowercase())
        .filter(|email| email != "unknown" && !excluded.contains(email))
        .take(RECENT_SHOWN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(email: &str, created_at: i64) -> ClerkUser {
        ClerkUser {
            id: format!("user_{}", created_at),
            created_at,
            email_addresses: if email.is_empty() {
                Vec::new()
            } else {
                vec![EmailAddress {
                    email_address: email.to_string(),
                }]
            },
        }
    }

    #[test]
    fn test_recent_emails_filtering() {
        let users = vec![
            user("Founder@Example.com", 6),
            user("", 5),
            user("a@example.com", 4),
            user("b@example.com", 3),
            user("c@example.com", 2),
            user("d@example.com", 1),
            user("e@example.com", 0),
        ];
        let emails = recent_emails(&users, &["founder@example.com".to_string()]);
        assert_eq!(
            emails,
            vec!["a@example.com", "b@example.com", "c@example.com", "d@example.com", "e@example.com"]
        );
    }

    #[test]
    fn test_month_tally() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let bounds = month_boundaries(&now).unwrap();
        let march = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap().timestamp_millis();
        let february = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap().timestamp_millis();
        let january = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap().timestamp_millis();

        let mut tally = MonthTally::default();
        // Page ends inside February: keep paging
        assert!(tally.add_page(&[user("a@x.io", march), user("b@x.io", february)], &bounds));
        // Page reaches January: stop
        assert!(!tally.add_page(&[user("c@x.io", february), user("d@x.io", january)], &bounds));

        assert_eq!(tally.counts, MonthUsers { total: 1, previous_total: 2 });
        assert_eq!(tally.pages, 2);
        assert_eq!(tally.sample.len(), 4);
        assert_eq!(tally.sample[3].2, "older");
    }

    #[test]
    fn test_user_deserialization() {
        let user: ClerkUser = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "created_at": 1700000000000i64,
            "email_addresses": [{"id": "idn_1", "email_address": "x@example.com"}],
            "first_name": "X"
        }))
        .unwrap();
        assert_eq!(user.primary_email(), "x@example.com");
    }
}
