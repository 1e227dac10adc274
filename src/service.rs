use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{CipeWatchError, Result};
use crate::monitor::{CloudMonitor, Presenter};
use crate::notifications::{NotificationEngine, NotificationSetting, DEFAULT_AI_FIX_WAIT_SECS};
use crate::polling::{PollingScheduler, PollingTiers};
use crate::source::CipeSource;
use crate::view::OnboardingInfo;

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub tiers: PollingTiers,
    pub ai_fix_wait: chrono::Duration,
    pub notification_setting: NotificationSetting,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            tiers: PollingTiers::default(),
            ai_fix_wait: chrono::Duration::seconds(DEFAULT_AI_FIX_WAIT_SECS),
            notification_setting: NotificationSetting::default(),
        }
    }
}

/// Control surface of a running monitoring service.
///
/// Dropping every handle stops the service at its next wait.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    force_poll: mpsc::Sender<()>,
    onboarding: mpsc::UnboundedSender<OnboardingInfo>,
    setting: Arc<watch::Sender<NotificationSetting>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServiceHandle {
    /// Requests an immediate fetch. Requests made while a fetch is running are dropped.
    pub fn force_poll(&self) -> Result<()> {
        match self.force_poll.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err(CipeWatchError::ServiceStopped),
        }
    }

    pub fn update_onboarding(&self, info: OnboardingInfo) -> Result<()> {
        self.onboarding
            .send(info)
            .map_err(|_| CipeWatchError::ServiceStopped)
    }

    /// Changes the notification setting, effective from the next fetch.
    pub fn set_notification_setting(&self, setting: NotificationSetting) -> Result<()> {
        self.setting
            .send(setting)
            .map_err(|_| CipeWatchError::ServiceStopped)
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

struct Channels {
    force_poll: mpsc::Receiver<()>,
    onboarding: mpsc::UnboundedReceiver<OnboardingInfo>,
    setting: watch::Receiver<NotificationSetting>,
    shutdown: watch::Receiver<bool>,
}

/// Starts the polling service on the current tokio runtime.
///
/// The first fetch runs immediately. Everything downstream of the source runs
/// on the spawned task, which owns the scheduler and the monitor.
pub fn spawn<S, P>(source: S, presenter: P, options: ServiceOptions) -> (ServiceHandle, JoinHandle<()>)
where
    S: CipeSource + Send + Sync + 'static,
    P: Presenter + Send + 'static,
{
    let (force_tx, force_rx) = mpsc::channel(1);
    let (onboarding_tx, onboarding_rx) = mpsc::unbounded_channel();
    let (setting_tx, setting_rx) = watch::channel(options.notification_setting);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = ServiceHandle {
        force_poll: force_tx,
        onboarding: onboarding_tx,
        setting: Arc::new(setting_tx),
        shutdown: Arc::new(shutdown_tx),
    };

    let scheduler = PollingScheduler::new(source, options.tiers);
    let monitor = CloudMonitor::new(presenter, NotificationEngine::new(options.ai_fix_wait));
    let channels = Channels {
        force_poll: force_rx,
        onboarding: onboarding_rx,
        setting: setting_rx,
        shutdown: shutdown_rx,
    };

    let task = tokio::spawn(run(scheduler, monitor, channels));
    (handle, task)
}

async fn run<S, P>(
    mut scheduler: PollingScheduler<S>,
    mut monitor: CloudMonitor<P>,
    mut channels: Channels,
) where
    S: CipeSource,
    P: Presenter,
{
    info!("CIPE monitoring started");

    loop {
        let outcome = scheduler.poll().await;

        if *channels.shutdown.borrow() {
            debug!("Discarding fetch result after shutdown request");
            break;
        }

        while channels.force_poll.try_recv().is_ok() {
            debug!("Ignoring poll request received during fetch");
        }

        if let Some(outcome) = outcome {
            let setting = *channels.setting.borrow();
            monitor.apply_fetch(outcome, setting, Utc::now());
        }

        if !wait_for_next_poll(&scheduler, &mut monitor, &mut channels).await {
            break;
        }
    }

    info!("CIPE monitoring stopped");
}

/// Waits out the current interval. Returns `false` when the service should stop.
async fn wait_for_next_poll<S, P>(
    scheduler: &PollingScheduler<S>,
    monitor: &mut CloudMonitor<P>,
    channels: &mut Channels,
) -> bool
where
    S: CipeSource,
    P: Presenter,
{
    let sleep = tokio::time::sleep(scheduler.interval());
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            Some(()) = channels.force_poll.recv() => {
                debug!("Forced poll requested");
                return true;
            }
            Some(info) = channels.onboarding.recv() => monitor.apply_onboarding(info),
            changed = channels.shutdown.changed() => {
                if changed.is_err() || *channels.shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
