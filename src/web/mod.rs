//! HTTP surface of the dashboard: JSON proxy routes, the Google OAuth flow
//! and the server-rendered page.

pub mod google;
pub mod handlers;
pub mod render;
pub mod response;

use crate::components::calendar_layout::DisplayWindow;
use crate::components::poller::SnapshotHandle;
use crate::components::providers::Providers;
use crate::config::Config;
use crate::error::DashResult;
use axum::routing::get;
use axum::Router;
use chrono_tz::Tz;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of every route
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Providers,
    pub snapshot: SnapshotHandle,
    pub tz: Tz,
    pub window: DisplayWindow,
}

impl AppState {
    pub fn new(config: Arc<Config>, providers: Providers, snapshot: SnapshotHandle) -> DashResult<Self> {
        let tz = config.tz()?;
        let window = config.display_window()?;
        Ok(Self {
            config,
            providers,
            snapshot,
            tz,
            window,
        })
    }

    /// Page reload period, the shortest feed interval
    pub fn page_refresh_secs(&self) -> u64 {
        self.config
            .usage_refresh_secs
            .min(self.config.analytics_refresh_secs)
            .min(self.config.revenue_refresh_secs)
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(render::dashboard))
        .route("/health", get(handlers::health))
        .route("/api/usage", get(handlers::usage))
        .route("/api/analytics", get(handlers::analytics))
        .route("/api/revenue", get(handlers::revenue))
        .route("/api/stripe/arr", get(handlers::stripe_arr))
        .route("/api/clerk/total-users", get(handlers::clerk_total_users))
        .route("/api/clerk/recent-users", get(handlers::clerk_recent_users))
        .route("/api/clerk/month-users", get(handlers::clerk_month_users))
        .route("/api/posthog/month-visitors", get(handlers::posthog_month_visitors))
        .route("/api/posthog/month-regions", get(handlers::posthog_month_regions))
        .route("/api/posthog/sessions-per-user", get(handlers::posthog_sessions_per_user))
        .route("/api/google/auth", get(google::auth))
        .route("/api/google/callback", get(google::callback))
        .route("/api/google/events", get(google::events))
        .route("/api/calendar/week", get(google::calendar_week))
        .route("/api/snapshot", get(handlers::snapshot))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
