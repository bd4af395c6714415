//! Device monitor
//!
//! Polls the source and target probes and publishes the combined result as a
//! [`DeviceSnapshot`]. Refreshes run one at a time, so subscribers always see
//! the snapshot of the most recently started refresh.

use chatbridge_common::{ChatbridgeConfig, DeviceRole, DeviceSnapshot, DeviceStatus};
use chatbridge_helper::ToolLocator;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::probe::{DeviceProbe, ToolProbe};

struct MonitorInner {
    source: Arc<dyn DeviceProbe>,
    target: Arc<dyn DeviceProbe>,
    state: watch::Sender<DeviceSnapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl MonitorInner {
    async fn refresh(&self) -> DeviceSnapshot {
        // A slow earlier refresh must not overwrite a newer result
        let _guard = self.refresh_lock.lock().await;

        let (source, target) = tokio::join!(self.source.probe(), self.target.probe());

        let snapshot = DeviceSnapshot {
            source,
            target,
            refreshed_at: Some(Utc::now()),
        };

        let previous = self.state.send_replace(snapshot.clone());
        log_transition(self.source.role(), &previous.source, &snapshot.source);
        log_transition(self.target.role(), &previous.target, &snapshot.target);

        snapshot
    }
}

fn log_transition(role: DeviceRole, before: &DeviceStatus, after: &DeviceStatus) {
    match (before.connected, after.connected) {
        (false, true) => log::info!(
            "{} device connected: {}",
            role,
            after.info.as_deref().unwrap_or("unknown")
        ),
        (true, false) => log::info!("{} device disconnected", role),
        _ => {}
    }
}

/// Periodically detects the source and target devices
pub struct DeviceMonitor {
    inner: Arc<MonitorInner>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceMonitor {
    pub fn new(source: Arc<dyn DeviceProbe>, target: Arc<dyn DeviceProbe>) -> Self {
        if source.role() != DeviceRole::Source || target.role() != DeviceRole::Target {
            log::warn!(
                "Device probes have unexpected roles: {} as source, {} as target",
                source.role(),
                target.role()
            );
        }

        let (state, _) = watch::channel(DeviceSnapshot::default());

        Self {
            inner: Arc::new(MonitorInner {
                source,
                target,
                state,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
            poller: Mutex::new(None),
        }
    }

    /// Monitor backed by `adb` and `ideviceinfo`
    pub fn from_config(config: &ChatbridgeConfig) -> Self {
        let locator = ToolLocator::from_env();
        let timeout = config.detection_timeout();

        Self::new(
            Arc::new(ToolProbe::android(locator.clone(), timeout)),
            Arc::new(ToolProbe::ios(locator, timeout)),
        )
    }

    /// Probe both devices once and publish the result
    pub async fn refresh(&self) -> DeviceSnapshot {
        self.inner.refresh().await
    }

    /// Start polling every `interval`, refreshing immediately
    ///
    /// Replaces a poller that is already running. Must be called from within a
    /// tokio runtime.
    pub fn start_monitoring(&self, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                inner.refresh().await;
            }
        });

        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = poller.replace(handle) {
            previous.abort();
        }

        log::info!("Device monitoring started (every {:?})", interval);
    }

    /// Stop polling. Calling this when not monitoring does nothing.
    pub fn stop_monitoring(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            handle.abort();
            log::info!("Device monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.inner.state.subscribe()
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
