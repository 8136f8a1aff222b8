use super::response::{ApiContext, ApiError};
use super::AppState;
use crate::components::calendar_layout::{layout_week, normalize_events, WeekLayout};
use crate::components::google_calendar::{CalendarEvent, GoogleCalendarClient, TokenSet};
use crate::error::{DashResult, Error};
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const TOKENS_COOKIE: &str = "google_tokens";
pub const STATE_COOKIE: &str = "google_oauth_state";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Redirect to the Google consent screen
pub async fn auth(State(state): State<AppState>, jar: CookieJar) -> Result<(CookieJar, Redirect), ApiError> {
    let oauth = state.providers.google().context("Failed to start Google authorization")?;
    let csrf = Uuid::new_v4().to_string();
    let url = oauth
        .authorize_url(&csrf)
        .context("Failed to start Google authorization")?;

    let jar = jar.add(session_cookie(STATE_COOKIE, csrf, state.config.secure_cookies));
    Ok((jar, Redirect::to(url.as_str())))
}

/// Finish the OAuth flow and store the tokens cookie
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(error) = params.error {
        return Err(ApiError::bad_request("Authorization denied").with_details(error));
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing code"))?;

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    if expected.is_none() || expected != params.state {
        warn!("Rejected Google callback with mismatched state");
        return Err(ApiError::bad_request("Invalid OAuth state"));
    }

    let oauth = state.providers.google().context("Failed to connect Google Calendar")?;
    let tokens = oauth
        .exchange_code(&code)
        .await
        .context("Failed to connect Google Calendar")?;
    let value = tokens
        .to_cookie_value()
        .context("Failed to connect Google Calendar")?;

    info!("Google Calendar connected");
    let jar = jar
        .remove(removal(STATE_COOKIE))
        .add(session_cookie(TOKENS_COOKIE, value, state.config.secure_cookies));
    Ok((jar, Redirect::to("/")))
}

/// Tokens from the cookie, refreshed when expired.
///
/// The returned jar carries the rewritten cookie after a refresh. A refresh
/// that Google rejects counts as not connected.
pub(crate) async fn connected_tokens(state: &AppState, jar: CookieJar) -> DashResult<(CookieJar, TokenSet)> {
    let tokens = match jar.get(TOKENS_COOKIE) {
        Some(cookie) => TokenSet::from_cookie_value(cookie.value()).map_err(|e| {
            warn!("Discarding unreadable tokens cookie: {}", e);
            Error::NotConnected
        })?,
        None => return Err(Error::NotConnected),
    };

    if !tokens.is_expired() {
        return Ok((jar, tokens));
    }

    let oauth = state.providers.google()?;
    let refreshed = oauth.refresh(&tokens).await.map_err(|e| {
        warn!("Google token refresh failed, reconnect required: {}", e);
        Error::NotConnected
    })?;
    let value = refreshed.to_cookie_value()?;
    let jar = jar.add(session_cookie(TOKENS_COOKIE, value, state.config.secure_cookies));
    Ok((jar, refreshed))
}

/// Raw events of the current week across every calendar
pub(crate) async fn week_events(state: &AppState, tokens: &TokenSet) -> DashResult<Vec<CalendarEvent>> {
    let client = GoogleCalendarClient::new(tokens, state.providers.http().clone())?;
    let now = Utc::now().with_timezone(&state.tz);
    client.fetch_week_events(&now).await
}

/// Laid-out week grid for the current week
pub(crate) async fn week_layout(state: &AppState, tokens: &TokenSet) -> DashResult<WeekLayout> {
    let events = week_events(state, tokens).await?;
    let normalized = normalize_events(&events, &state.tz);
    Ok(layout_week(&normalized, &state.window))
}

pub async fn events(State(state): State<AppState>, jar: CookieJar) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (jar, tokens) = connected_tokens(&state, jar)
        .await
        .context("Failed to fetch events")?;
    let events = week_events(&state, &tokens)
        .await
        .context("Failed to fetch events")?;
    Ok((jar, Json(json!({ "success": true, "events": events }))))
}

pub async fn calendar_week(State(state): State<AppState>, jar: CookieJar) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (jar, tokens) = connected_tokens(&state, jar)
        .await
        .context("Failed to build calendar")?;
    let layout = week_layout(&state, &tokens)
        .await
        .context("Failed to build calendar")?;
    Ok((jar, Json(json!({ "success": true, "layout": layout }))))
}
