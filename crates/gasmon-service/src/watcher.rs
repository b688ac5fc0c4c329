//! Background watcher over the `latest` slot of each configured device.
//!
//! The watcher is the second entry point into the alert hook: instead of
//! receiving before/after pairs it subscribes to the store and remembers the
//! previous value per device itself. The first value seen for a device has no
//! previous, so an ALERT already present at startup notifies once.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gasmon_core::{DataStore, DeviceId, Reading};

use crate::debounce::Debouncer;
use crate::state::AppState;

type LatestEvent = (DeviceId, gasmon_core::Result<Option<Reading>>);

/// Watches every configured device and feeds writes through the hook.
pub struct Watcher {
    state: Arc<AppState>,
    store: Arc<dyn DataStore>,
}

impl Watcher {
    /// Create a new watcher.
    pub fn new(state: Arc<AppState>, store: Arc<dyn DataStore>) -> Self {
        Self { state, store }
    }

    /// Subscribe to all configured devices and start watching.
    ///
    /// Returns immediately; the work happens on one background task that ends
    /// when every subscription has ended or the stop signal fires.
    pub fn start(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let devices = state.config.watcher.device_ids();
            if devices.is_empty() {
                info!("No devices configured for watching");
                return;
            }

            info!("Starting watcher for {} device(s)", devices.len());
            state.watcher.set_running(true);
            watch_devices(&state, store.as_ref(), devices).await;
            state.watcher.set_running(false);
            info!("Watcher stopped");
        })
    }
}

async fn watch_devices(state: &AppState, store: &dyn DataStore, devices: Vec<DeviceId>) {
    let mut streams: Vec<BoxStream<'static, LatestEvent>> = Vec::with_capacity(devices.len());
    for device in devices {
        match store.subscribe_latest(&device).await {
            Ok(subscription) => {
                debug!("Subscribed to {}", device.latest_path());
                streams.push(
                    subscription
                        .map(move |item| (device.clone(), item))
                        .boxed(),
                );
            }
            Err(e) => error!("Failed to subscribe to {}: {}", device, e),
        }
    }
    if streams.is_empty() {
        return;
    }

    let mut events = stream::select_all(streams);
    let mut stop = state.watcher.subscribe_stop();
    let mut debouncer = Debouncer::new();

    loop {
        tokio::select! {
            () = stop_signalled(&mut stop) => break,
            event = events.next() => {
                let Some((device, item)) = event else {
                    warn!("All watcher subscriptions ended");
                    break;
                };
                match item {
                    Ok(after) => {
                        let before = debouncer.observe(&device, after.as_ref());
                        state.handle_write(&device, before.as_ref(), after.as_ref()).await;
                    }
                    Err(e) => warn!("Watcher stream error on {}: {}", device, e),
                }
            }
        }
    }
}

/// Resolve once the stop flag is set. The borrow guard is released here so
/// the watcher future stays `Send`.
async fn stop_signalled(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        // Sender gone: nobody can stop us any more.
        std::future::pending::<()>().await;
    }
}
