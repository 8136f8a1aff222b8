//! Periodic refresh of the dashboard cards.
//!
//! Each feed runs on its own timer, started by `init` and cancelled by
//! `shutdown`. The latest results are kept in a shared [`DashboardSnapshot`].

use crate::components::metrics::{self, AnalyticsReport, Revenue, UsageReport};
use crate::components::providers::Providers;
use crate::config::Config;
use crate::error::{component_error, DashResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cached state of one polled data source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: true,
            updated_at: None,
        }
    }
}

impl<T> FeedState<T> {
    fn begin(&mut self) {
        self.loading = true;
    }

    /// Record a refresh result; a failure keeps the last good data
    fn finish(&mut self, result: DashResult<T>) {
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.updated_at = Some(Utc::now());
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

/// Latest values of every dashboard feed
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub usage: FeedState<UsageReport>,
    pub analytics: FeedState<AnalyticsReport>,
    pub revenue: FeedState<Revenue>,
}

pub type SnapshotHandle = Arc<RwLock<DashboardSnapshot>>;

/// Picks one feed out of the snapshot
pub type FeedSelector<T> = fn(&mut DashboardSnapshot) -> &mut FeedState<T>;

/// Run one refresh of a feed and store the outcome
pub async fn refresh_feed<T, Fut>(snapshot: &SnapshotHandle, feed: &str, select: FeedSelector<T>, fetch: Fut)
where
    Fut: Future<Output = DashResult<T>>,
{
    select(&mut *snapshot.write().await).begin();

    let result = fetch.await;
    match &result {
        Ok(_) => debug!("Refreshed {} feed", feed),
        Err(e) => warn!("Failed to refresh {} feed: {}", feed, e),
    }

    select(&mut *snapshot.write().await).finish(result);
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Component that keeps the dashboard snapshot up to date
#[derive(Default)]
pub struct DashboardPoller {
    snapshot: SnapshotHandle,
    running: Mutex<Option<Running>>,
}

impl DashboardPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the cached snapshot
    pub fn snapshot(&self) -> SnapshotHandle {
        Arc::clone(&self.snapshot)
    }

    fn spawn_feed<T, F, Fut>(
        &self,
        feed: &'static str,
        period: Duration,
        cancel: CancellationToken,
        select: FeedSelector<T>,
        fetch: F,
    ) -> JoinHandle<()>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = DashResult<T>> + Send + 'static,
    {
        let snapshot = self.snapshot();
        info!("Polling {} feed every {}s", feed, period.as_secs());

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = refresh_feed(&snapshot, feed, select, fetch()) => {}
                        }
                    }
                }
            }

            debug!("Stopped polling {} feed", feed);
        })
    }
}

#[async_trait]
impl super::Component for DashboardPoller {
    fn name(&self) -> &'static str {
        "poller"
    }

    async fn init(&self, config: Arc<Config>, providers: Providers) -> DashResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Dashboard poller is already running, skipping initialization");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        let usage_providers = providers.clone();
        tasks.push(self.spawn_feed(
            "usage",
            Duration::from_secs(config.usage_refresh_secs),
            cancel.child_token(),
            |s| &mut s.usage,
            move || {
                let providers = usage_providers.clone();
                async move { metrics::usage(&providers).await }
            },
        ));

        let analytics_providers = providers.clone();
        tasks.push(self.spawn_feed(
            "analytics",
            Duration::from_secs(config.analytics_refresh_secs),
            cancel.child_token(),
            |s| &mut s.analytics,
            move || {
                let providers = analytics_providers.clone();
                async move { metrics::analytics(&providers).await }
            },
        ));

        tasks.push(self.spawn_feed(
            "revenue",
            Duration::from_secs(config.revenue_refresh_secs),
            cancel.child_token(),
            |s| &mut s.revenue,
            move || {
                let providers = providers.clone();
                async move { metrics::revenue(&providers).await }
            },
        ));

        *running = Some(Running { cancel, tasks });
        Ok(())
    }

    async fn shutdown(&self) -> DashResult<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.cancel.cancel();
        let mut failed = 0;
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!("Poller task ended abnormally: {}", e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(component_error(&format!("{} poller tasks ended abnormally", failed)));
        }
        info!("Dashboard poller stopped");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::providers::posthog::UsageEntry;
    use crate::components::Component;
    use crate::error::other_error;

    fn usage(cost: f64) -> UsageReport {
        UsageReport::new(vec![UsageEntry {
            email: "a@example.com".to_string(),
            cost,
        }])
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_data() {
        let snapshot = SnapshotHandle::default();
        assert!(snapshot.read().await.usage.loading);

        refresh_feed(&snapshot, "usage", |s| &mut s.usage, async { Ok(usage(2.0)) }).await;
        {
            let state = snapshot.read().await;
            assert!(!state.usage.loading);
            assert!(state.usage.error.is_none());
            assert!(state.usage.updated_at.is_some());
        }

        refresh_feed(&snapshot, "usage", |s| &mut s.usage, async { Err(other_error("upstream down")) }).await;
        let state = snapshot.read().await;
        assert_eq!(state.usage.data.as_ref().map(|u| u.total), Some(2.0));
        assert_eq!(state.usage.error.as_deref(), Some("Other error: upstream down"));
        assert!(!state.usage.loading);
    }

    #[tokio::test]
    async fn test_poller_records_missing_configuration() {
        let poller = DashboardPoller::new();
        let snapshot = poller.snapshot();

        poller
            .init(Arc::new(Config::default()), Providers::default())
            .await
            .unwrap();

        for _ in 0..200 {
            let state = snapshot.read().await;
            if state.usage.error.is_some() && state.analytics.error.is_some() && state.revenue.error.is_some() {
                break;
            }
            drop(state);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        poller.shutdown().await.unwrap();

        let state = snapshot.read().await;
        assert_eq!(state.revenue.error.as_deref(), Some("Configuration error: Missing STRIPE_SECRET_KEY"));
        assert!(state.usage.error.is_some());
        assert!(state.analytics.data.is_none());
        assert!(poller.running.lock().await.is_none());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = DashboardSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["revenue"]["loading"], true);
        assert!(json["usage"]["updatedAt"].is_null());
    }
}
