use super::response::{ApiContext, ApiError};
use super::AppState;
use crate::components::metrics;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

type ApiResult = Result<Json<Value>, ApiError>;

// Handler for API health check
pub async fn health() -> &'static str {
    "OK"
}

pub async fn usage(State(state): State<AppState>) -> ApiResult {
    let report = metrics::usage(&state.providers)
        .await
        .context("Failed to fetch data")?;
    Ok(Json(json!({
        "success": true,
        "data": report.data,
        "total": report.total,
    })))
}

pub async fn analytics(State(state): State<AppState>) -> ApiResult {
    let report = metrics::analytics(&state.providers)
        .await
        .context("Failed to fetch analytics")?;
    Ok(Json(json!({
        "success": true,
        "data": report.data,
        "regions": report.regions,
    })))
}

pub async fn revenue(State(state): State<AppState>) -> ApiResult {
    let revenue = metrics::revenue(&state.providers)
        .await
        .context("Failed to fetch revenue data")?;
    Ok(Json(json!({ "success": true, "data": revenue })))
}

pub async fn stripe_arr(State(state): State<AppState>) -> ApiResult {
    let stripe = state.providers.stripe().context("Failed to fetch ARR")?;
    let arr = stripe
        .annual_recurring_revenue()
        .await
        .context("Failed to fetch ARR")?;
    Ok(Json(json!({ "success": true, "arr": arr })))
}

pub async fn clerk_total_users(State(state): State<AppState>) -> ApiResult {
    let clerk = state.providers.clerk().context("Failed to fetch total users")?;
    let total = clerk.total_users().await.context("Failed to fetch total users")?;
    Ok(Json(json!({ "success": true, "total": total })))
}

pub async fn clerk_recent_users(State(state): State<AppState>) -> ApiResult {
    let clerk = state.providers.clerk().context("Failed to fetch recent users")?;
    let emails = clerk
        .recent_users(state.providers.excluded_emails())
        .await
        .context("Failed to fetch recent users")?;
    let users: Vec<Value> = emails.into_iter().map(|email| json!({ "email": email })).collect();
    Ok(Json(json!({ "success": true, "users": users })))
}

pub async fn clerk_month_users(State(state): State<AppState>) -> ApiResult {
    let clerk = state.providers.clerk().context("Failed to fetch month users")?;
    let counts = clerk
        .month_users(Utc::now())
        .await
        .context("Failed to fetch month users")?;
    Ok(Json(json!({
        "success": true,
        "total": counts.total,
        "previousTotal": counts.previous_total,
    })))
}

pub async fn posthog_month_visitors(State(state): State<AppState>) -> ApiResult {
    let posthog = state.providers.posthog().context("Failed to fetch month visitors")?;
    let total = posthog
        .month_visitors()
        .await
        .context("Failed to fetch month visitors")?;
    Ok(Json(json!({ "success": true, "total": total })))
}

pub async fn posthog_month_regions(State(state): State<AppState>) -> ApiResult {
    let posthog = state.providers.posthog().context("Failed to fetch month regions")?;
    let regions = posthog
        .month_regions()
        .await
        .context("Failed to fetch month regions")?;
    Ok(Json(json!({ "success": true, "regions": regions })))
}

pub async fn posthog_sessions_per_user(State(state): State<AppState>) -> ApiResult {
    let posthog = state
        .providers
        .posthog()
        .context("Failed to fetch sessions per user")?;
    let users = posthog
        .sessions_per_user(state.providers.excluded_emails())
        .await
        .context("Failed to fetch sessions per user")?;
    Ok(Json(json!({ "success": true, "users": users })))
}

/// Cached poller state, without calling any provider
pub async fn snapshot(State(state): State<AppState>) -> ApiResult {
    let snapshot = state.snapshot.read().await;
    Ok(Json(json!({
        "success": true,
        "usage": snapshot.usage,
        "analytics": snapshot.analytics,
        "revenue": snapshot.revenue,
    })))
}
