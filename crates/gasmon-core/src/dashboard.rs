//! Live dashboard view model.
//!
//! A [`Dashboard`] subscribes to a device's latest reading, its threshold
//! config and the last [`CHART_HISTORY_LIMIT`] history entries. A single task
//! folds the three streams into a [`LatestJoin`] and publishes a
//! [`DashboardSnapshot`] on a watch channel after every change. When an
//! [`AlarmHandle`] is attached, each derived status is forwarded to it.
//!
//! Read failures never stop the dashboard. A config failure falls back to the
//! last known thresholds (or the defaults). A latest or history stream that
//! cannot be opened leaves no reading and an empty chart.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gasmon_types::{DeviceId, Reading, Status, ThresholdConfig};

use crate::error::Result;
use crate::history::{CHART_HISTORY_LIMIT, ChartSeries, SortOrder, filter_notable};
use crate::siren::AlarmHandle;
use crate::streaming::Subscription;
use crate::thresholds::Thresholds;
use crate::traits::DataStore;

/// What the dashboard renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Latest reading, if the device has published one.
    pub latest: Option<Reading>,
    /// Thresholds in effect.
    pub config: ThresholdConfig,
    /// Status of `latest` under `config`; OK when there is no reading.
    pub status: Status,
    /// The device's embedded status disagrees with `status`.
    pub stale: bool,
    /// Notable history points for the chart.
    pub chart: ChartSeries,
}

/// Latest known value of each dashboard input.
///
/// Every setter replaces one input; [`snapshot`](Self::snapshot) recomputes
/// the status and chart from the current combination, so a new config
/// reclassifies the reading that is already on screen.
#[derive(Debug, Clone, Default)]
pub struct LatestJoin {
    latest: Option<Reading>,
    config: Option<ThresholdConfig>,
    history: Vec<Reading>,
}

impl LatestJoin {
    /// Replace the latest reading.
    pub fn set_latest(&mut self, latest: Option<Reading>) {
        self.latest = latest;
    }

    /// Replace the config; `None` means the defaults apply.
    pub fn set_config(&mut self, config: Option<ThresholdConfig>) {
        self.config = config;
    }

    /// Replace the history window.
    pub fn set_history(&mut self, history: Vec<Reading>) {
        self.history = history;
    }

    /// Thresholds in effect.
    pub fn config(&self) -> ThresholdConfig {
        self.config.unwrap_or_default()
    }

    /// Current derived status.
    pub fn status(&self) -> Status {
        crate::thresholds::classify_reading(self.latest.as_ref(), &self.config())
    }

    /// Build the snapshot for the current inputs.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let config = self.config();
        let thresholds = Thresholds::new(config);
        DashboardSnapshot {
            latest: self.latest.clone(),
            config,
            status: self.status(),
            stale: self
                .latest
                .as_ref()
                .is_some_and(|r| thresholds.is_stale(r)),
            chart: ChartSeries::from_history(&self.history, config.warn),
        }
    }
}

/// Running dashboard for one device.
pub struct Dashboard {
    device: DeviceId,
    snapshot: watch::Receiver<DashboardSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("device", &self.device)
            .field("running", &!self.cancel.is_cancelled())
            .finish()
    }
}

impl Dashboard {
    /// Open the subscriptions and start the dashboard task.
    ///
    /// A stream that cannot be opened is logged and left empty: no reading,
    /// an empty chart, or the default thresholds.
    pub async fn start(
        store: Arc<dyn DataStore>,
        device: DeviceId,
        alarm: Option<AlarmHandle>,
    ) -> Self {
        let latest = open_or_log(
            store.subscribe_latest(&device).await,
            "Latest reading",
            &device,
        );
        let history = open_or_log(
            store
                .subscribe_history(&device, Some(CHART_HISTORY_LIMIT))
                .await,
            "History",
            &device,
        );
        let config = open_or_log(
            store.subscribe_config(&device).await,
            "Config (using defaults)",
            &device,
        );

        let join = LatestJoin::default();
        let (snapshot_tx, snapshot_rx) = watch::channel(join.snapshot());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_dashboard(
            Inputs {
                latest,
                history,
                config,
            },
            join,
            snapshot_tx,
            alarm,
            cancel.clone(),
        ));
        info!("Dashboard started for {}", device);

        Self {
            device,
            snapshot: snapshot_rx,
            cancel,
            task: Some(task),
        }
    }

    /// The device being shown.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.clone()
    }

    /// Close every subscription and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Dashboard task ended abnormally: {}", e);
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Inputs {
    latest: Option<Subscription<Option<Reading>>>,
    history: Option<Subscription<Vec<Reading>>>,
    config: Option<Subscription<Option<ThresholdConfig>>>,
}

impl Inputs {
    fn is_empty(&self) -> bool {
        self.latest.is_none() && self.history.is_none() && self.config.is_none()
    }
}

fn open_or_log<T>(
    result: Result<Subscription<T>>,
    what: &str,
    device: &DeviceId,
) -> Option<Subscription<T>> {
    match result {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!("{} unavailable for {}: {}", what, device, e);
            None
        }
    }
}

async fn next<T>(sub: &mut Option<Subscription<T>>) -> Option<Result<T>> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Drop a subscription whose producer stopped.
fn on_closed<T>(slot: &mut Option<Subscription<T>>) {
    if let Some(sub) = slot.take() {
        debug!("Subscription to {} ended", sub.path());
    }
}

async fn run_dashboard(
    mut inputs: Inputs,
    mut join: LatestJoin,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    alarm: Option<AlarmHandle>,
    cancel: CancellationToken,
) {
    let mut last_status: Option<Status> = None;

    loop {
        if inputs.is_empty() {
            // Keep the last snapshot published until the dashboard closes.
            cancel.cancelled().await;
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = next(&mut inputs.latest) => match item {
                Some(Ok(latest)) => join.set_latest(latest),
                Some(Err(e)) => {
                    warn!("Latest reading unavailable: {}", e);
                    continue;
                }
                None => {
                    on_closed(&mut inputs.latest);
                    continue;
                }
            },
            item = next(&mut inputs.config) => match item {
                Some(Ok(config)) => join.set_config(config),
                Some(Err(e)) => {
                    warn!("Config read failed, keeping last known thresholds: {}", e);
                    continue;
                }
                None => {
                    on_closed(&mut inputs.config);
                    continue;
                }
            },
            item = next(&mut inputs.history) => match item {
                Some(Ok(history)) => join.set_history(history),
                Some(Err(e)) => {
                    warn!("History unavailable: {}", e);
                    continue;
                }
                None => {
                    on_closed(&mut inputs.history);
                    continue;
                }
            },
        }

        let snapshot = join.snapshot();
        if last_status != Some(snapshot.status) {
            debug!("Status now {}", snapshot.status);
            last_status = Some(snapshot.status);
            if let Some(alarm) = &alarm
                && let Err(e) = alarm.update_status(snapshot.status).await
            {
                debug!("Alarm no longer listening: {}", e);
            }
        }
        snapshot_tx.send_replace(snapshot);
    }
    debug!("Dashboard task stopped");
}

/// Load the full history once and return its notable entries, newest first.
///
/// The warn threshold comes from the stored config, falling back to the
/// default when it cannot be read within `timeout`. A history read that
/// fails or times out yields an empty list.
pub async fn load_review(
    store: &dyn DataStore,
    device: &DeviceId,
    timeout: Duration,
) -> Vec<Reading> {
    let config = match store.subscribe_config(device).await {
        Ok(mut sub) => sub.first(timeout).await,
        Err(e) => Err(e),
    };
    let warn_at = match config {
        Ok(config) => config.unwrap_or_default().warn,
        Err(e) => {
            warn!("Using default thresholds for review: {}", e);
            ThresholdConfig::default().warn
        }
    };

    let series = match store.subscribe_history(device, None).await {
        Ok(mut history) => {
            let series = history.first(timeout).await;
            history.close();
            series
        }
        Err(e) => Err(e),
    };
    let series = series.unwrap_or_else(|e| {
        warn!("History unavailable for review: {}", e);
        Vec::new()
    });
    filter_notable(&series, warn_at, SortOrder::Descending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use crate::siren::{AlarmController, SilentAudio};

    fn reading(ts: i64, index: f64) -> Reading {
        Reading::builder().timestamp(ts).index(index).build()
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<DashboardSnapshot>, pred: F) -> DashboardSnapshot
    where
        F: Fn(&DashboardSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
            .await
            .expect("snapshot never matched")
            .expect("dashboard stopped")
            .clone()
    }

    #[test]
    fn test_join_reclassifies_on_new_config() {
        let mut join = LatestJoin::default();
        assert_eq!(join.status(), Status::Ok);

        join.set_latest(Some(reading(1, 50.0)));
        assert_eq!(join.status(), Status::Warn);

        join.set_config(Some(ThresholdConfig { warn: 20.0, alert: 40.0 }));
        assert_eq!(join.status(), Status::Alert);

        join.set_config(None);
        assert_eq!(join.status(), Status::Warn);
    }

    #[test]
    fn test_join_snapshot_chart_uses_warn() {
        let mut join = LatestJoin::default();
        join.set_history(vec![reading(1_000, 10.0), reading(2_000, 40.0), reading(3_000, 60.0)]);
        let snap = join.snapshot();
        assert_eq!(snap.chart.points.len(), 2);
        assert_eq!(snap.chart.points[0].label, 2);
    }

    #[tokio::test]
    async fn test_dashboard_follows_store() {
        let store = Arc::new(MockStore::new());
        let device = DeviceId::default();
        let dashboard = Dashboard::start(store.clone(), device.clone(), None).await;
        let mut rx = dashboard.subscribe();

        store.set_latest(&device, &reading(1_000, 45.0)).await.unwrap();
        let snap = wait_for(&mut rx, |s| s.latest.is_some()).await;
        assert_eq!(snap.status, Status::Warn);
        assert_eq!(snap.config, ThresholdConfig::default());

        store
            .set_config(&device, &ThresholdConfig { warn: 10.0, alert: 40.0 })
            .await
            .unwrap();
        let snap = wait_for(&mut rx, |s| s.config.warn == 10.0).await;
        assert_eq!(snap.status, Status::Alert);

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_config_failure_uses_defaults() {
        let store = Arc::new(MockStore::new());
        store.set_config_error(Some("permission denied")).await;
        let device = DeviceId::default();
        let dashboard = Dashboard::start(store.clone(), device.clone(), None).await;
        let mut rx = dashboard.subscribe();

        store.set_latest(&device, &reading(1_000, 61.0)).await.unwrap();
        let snap = wait_for(&mut rx, |s| s.latest.is_some()).await;
        assert_eq!(snap.config, ThresholdConfig::default());
        assert_eq!(snap.status, Status::Alert);
    }

    #[tokio::test]
    async fn test_status_forwarded_to_alarm() {
        let store = Arc::new(MockStore::new());
        let device = DeviceId::default();
        let controller = AlarmController::start(Arc::new(SilentAudio));
        let alarm = controller.handle();
        let dashboard = Dashboard::start(store.clone(), device.clone(), Some(alarm.clone())).await;

        let mut state = alarm.subscribe();
        store.set_latest(&device, &reading(1_000, 80.0)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| s.is_alerting))
            .await
            .unwrap()
            .unwrap();

        store.set_latest(&device, &reading(2_000, 5.0)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| !s.is_alerting))
            .await
            .unwrap()
            .unwrap();

        dashboard.shutdown().await;
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_load_review_newest_first() {
        let store = MockStore::new();
        let device = DeviceId::default();
        for (ts, index) in [(1, 10.0), (2, 40.0), (3, 60.0), (4, 20.0)] {
            store.push_history(&device, &reading(ts, index)).await.unwrap();
        }
        let review = load_review(&store, &device, Duration::from_secs(1)).await;
        let indices: Vec<f64> = review.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![60.0, 40.0]);
    }

    #[tokio::test]
    async fn test_load_review_read_failure_is_empty() {
        let store = MockStore::new();
        let device = DeviceId::default();
        store.push_history(&device, &reading(1, 70.0)).await.unwrap();
        store.set_should_fail(true, Some("permission denied")).await;

        let review = load_review(&store, &device, Duration::from_secs(1)).await;
        assert!(review.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_survives_failed_subscriptions() {
        let store = Arc::new(MockStore::new());
        store.set_should_fail(true, Some("permission denied")).await;
        let dashboard = Dashboard::start(store, DeviceId::default(), None).await;

        let snap = dashboard.snapshot();
        assert!(snap.latest.is_none());
        assert!(snap.chart.is_empty());
        assert_eq!(snap.config, ThresholdConfig::default());
        assert_eq!(snap.status, Status::Ok);

        // The task stays up until shutdown, so subscribers are not closed.
        let mut rx = dashboard.subscribe();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.changed())
                .await
                .is_err()
        );
        dashboard.shutdown().await;
    }
}
