use crate::error::{google_calendar_error, DashResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Seconds before expiry at which a token is already treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;
/// Lifetime assumed when Google omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// OAuth tokens kept in the browser cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenSet {
    /// Whether the access token expires within the skew window of `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - EXPIRY_SKEW_SECS <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Encode as base64url JSON for a cookie value
    pub fn to_cookie_value(&self) -> DashResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a cookie value produced by [`TokenSet::to_cookie_value`]
    pub fn from_cookie_value(value: &str) -> DashResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|e| google_calendar_error(&format!("Invalid token cookie: {}", e)))?;
        let tokens: TokenSet = serde_json::from_slice(&bytes)
            .map_err(|e| google_calendar_error(&format!("Invalid token cookie: {}", e)))?;
        if tokens.access_token.is_empty() {
            return Err(google_calendar_error("Token cookie has no access token"));
        }
        Ok(tokens)
    }
}

/// Body of the token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token_set(self, previous_refresh: Option<String>, now: i64) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Some(now + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)),
        }
    }
}

/// Google OAuth 2.0 web-server flow
#[derive(Clone)]
pub struct GoogleOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl std::fmt::Debug for GoogleOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuth")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http,
        }
    }

    /// Consent screen URL requesting offline read-only calendar access
    pub fn authorize_url(&self, state: &str) -> DashResult<Url> {
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| google_calendar_error(&format!("Failed to build authorization URL: {}", e)))
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> DashResult<TokenSet> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.request_token(&params, "exchange code").await?;
        info!("Exchanged Google authorization code for tokens");
        Ok(response.into_token_set(None, Utc::now().timestamp()))
    }

    /// Refresh an access token, keeping the old refresh token if Google omits one
    pub async fn refresh(&self, tokens: &TokenSet) -> DashResult<TokenSet> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| google_calendar_error("No refresh token in token data"))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.request_token(&params, "refresh token").await?;
        debug!("Refreshed Google access token");
        Ok(response.into_token_set(tokens.refresh_token.clone(), Utc::now().timestamp()))
    }

    async fn request_token(&self, params: &[(&str, &str)], action: &str) -> DashResult<TokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Failed to {}: HTTP {} - {}",
                action, status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse token response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:3000/api/google/callback".to_string(),
            Client::new(),
        )
    }

    #[test]
    fn test_authorize_url() {
        let url = oauth().authorize_url("abc123").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("prompt"), Some("consent"));
        assert_eq!(get("scope"), Some(CALENDAR_SCOPE));
        assert_eq!(get("state"), Some("abc123"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:3000/api/google/callback"));
    }

    #[test]
    fn test_cookie_round_trip() {
        let tokens = TokenSet {
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(1_700_000_000),
        };
        let value = tokens.to_cookie_value().unwrap();
        assert!(!value.contains('='));
        assert_eq!(TokenSet::from_cookie_value(&value).unwrap(), tokens);
    }

    #[test]
    fn test_invalid_cookie() {
        assert!(TokenSet::from_cookie_value("not base64!").is_err());
        let empty = URL_SAFE_NO_PAD.encode(br#"{"access_token":""}"#);
        assert!(TokenSet::from_cookie_value(&empty).is_err());
    }

    #[test]
    fn test_expiry_skew() {
        let tokens = TokenSet {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(1000),
        };
        assert!(!tokens.is_expired_at(900));
        assert!(tokens.is_expired_at(940));
        assert!(tokens.is_expired_at(2000));

        let no_expiry = TokenSet { expires_at: None, ..tokens };
        assert!(!no_expiry.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_in: Some(1800),
        };
        let tokens = response.into_token_set(Some("old-refresh".to_string()), 100);
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(tokens.expires_at, Some(1900));
    }
}
