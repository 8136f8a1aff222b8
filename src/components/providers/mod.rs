//! Typed clients for the external SaaS APIs.
//!
//! Every provider goes through [`ServiceClient`], which owns the base URL,
//! bearer credentials and status handling, so the individual clients only
//! describe endpoints and reshape responses.

pub mod clerk;
pub mod posthog;
pub mod stripe;

pub use clerk::ClerkClient;
pub use posthog::PostHogClient;
pub use stripe::StripeClient;

use crate::components::google_calendar::GoogleOAuth;
use crate::config::Config;
use crate::error::{config_error, provider_error, DashResult, Error};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// HTTP client for one provider, parameterized by endpoint and query
#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    base_url: Url,
    token: String,
    http: Client,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ServiceClient {
    /// Create a client for `service` rooted at `base_url`
    pub fn new(service: &'static str, base_url: &str, token: impl Into<String>, http: Client) -> DashResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| config_error(&format!("Invalid {} base URL {}: {}", service, base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(config_error(&format!("Invalid {} base URL {}", service, base_url)));
        }
        Ok(Self {
            service,
            base_url,
            token: token.into(),
            http,
        })
    }

    /// Build an endpoint URL from path segments.
    ///
    /// Segments are percent-encoded; an empty trailing segment yields a trailing slash.
    pub fn endpoint(&self, segments: &[&str]) -> DashResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| provider_error(self.service, "Base URL cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET an endpoint and decode its JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> DashResult<T> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        self.send(self.http.get(url)).await
    }

    /// POST a JSON body to an endpoint and decode the JSON response
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> DashResult<T> {
        let url = self.endpoint(segments)?;
        self.send(self.http.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> DashResult<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| provider_error(self.service, &format!("Request failed: {}", e)))?;

        let status = response.status();
        debug!("{} responded with {} for {}", self.service, status, response.url().path());
        if !status.is_success() {
            let details = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(Error::ProviderStatus {
                service: self.service,
                status: status.as_u16(),
                details,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| provider_error(self.service, &format!("Failed to parse response: {}", e)))
    }
}

/// The configured provider clients
#[derive(Clone, Default)]
pub struct Providers {
    posthog: Option<Arc<PostHogClient>>,
    clerk: Option<Arc<ClerkClient>>,
    stripe: Option<Arc<StripeClient>>,
    google: Option<Arc<GoogleOAuth>>,
    excluded_emails: Arc<Vec<String>>,
    http: Client,
}

impl Providers {
    /// Build every client the configuration has credentials for
    pub fn from_config(config: &Config) -> DashResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("opsdash/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let posthog = match (&config.posthog_api_key, &config.posthog_project_id) {
            (Some(key), Some(project)) => Some(Arc::new(PostHogClient::new(
                &config.posthog_host,
                key,
                project,
                http.clone(),
            )?)),
            _ => None,
        };
        let clerk = match &config.clerk_secret_key {
            Some(key) => Some(Arc::new(ClerkClient::new(key, http.clone())?)),
            None => None,
        };
        let stripe = match &config.stripe_secret_key {
            Some(key) => Some(Arc::new(StripeClient::new(key, http.clone())?)),
            None => None,
        };
        let google = match (&config.google_client_id, &config.google_client_secret, &config.google_redirect_uri) {
            (Some(id), Some(secret), Some(redirect)) => Some(Arc::new(GoogleOAuth::new(
                id.clone(),
                secret.clone(),
                redirect.clone(),
                http.clone(),
            ))),
            _ => None,
        };

        Ok(Self {
            posthog,
            clerk,
            stripe,
            google,
            excluded_emails: Arc::new(config.excluded_emails.clone()),
            http,
        })
    }

    /// PostHog client, if configured
    pub fn posthog(&self) -> DashResult<&PostHogClient> {
        self.posthog
            .as_deref()
            .ok_or_else(|| config_error("Missing PostHog config"))
    }

    /// Clerk client, if configured
    pub fn clerk(&self) -> DashResult<&ClerkClient> {
        self.clerk
            .as_deref()
            .ok_or_else(|| config_error("Missing CLERK_SECRET_KEY"))
    }

    /// Stripe client, if configured
    pub fn stripe(&self) -> DashResult<&StripeClient> {
        self.stripe
            .as_deref()
            .ok_or_else(|| config_error("Missing STRIPE_SECRET_KEY"))
    }

    /// Google OAuth client, if configured
    pub fn google(&self) -> DashResult<&GoogleOAuth> {
        self.google
            .as_deref()
            .ok_or_else(|| config_error("Missing Google OAuth environment variables"))
    }

    /// Emails of internal accounts hidden from user listings
    pub fn excluded_emails(&self) -> &[String] {
        &self.excluded_emails
    }

    /// Shared HTTP client
    pub fn http(&self) -> &Client {
        &self.http
    }
}

/// Read a JSON value as a number, accepting numeric strings
pub(crate) fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
