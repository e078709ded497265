//! TelemetryPoller - periodic republishing of trainer readings

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::telemetry::TrainerSource;
use crate::contract::{Message, Publisher};
use crate::domain::{DEFAULT_FTP_WATTS, percent_of_ftp};
use crate::registry::RegistryManager;

/// Poll period and how long stop waits for the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub stop_timeout: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct PollerState {
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Shared between the handle and the loop task
struct PollContext {
    publisher: Publisher,
    registry: RegistryManager,
    source: Arc<dyn TrainerSource>,
    trainers: Vec<String>,
    interval: Duration,
}

pub struct TelemetryPoller {
    context: Arc<PollContext>,
    stop_timeout: Duration,
    state: Mutex<PollerState>,
}

impl TelemetryPoller {
    pub fn new(
        publisher: Publisher,
        registry: RegistryManager,
        source: Arc<dyn TrainerSource>,
        trainers: Vec<String>,
        timing: PollTiming,
    ) -> Self {
        Self {
            context: Arc::new(PollContext {
                publisher,
                registry,
                source,
                trainers,
                interval: timing.interval,
            }),
            stop_timeout: timing.stop_timeout,
            state: Mutex::new(PollerState::default()),
        }
    }

    /// Start polling; false if already running
    pub async fn start(&self) -> bool {
        debug!("TelemetryPoller::start: called");
        let mut state = self.state.lock().await;

        if let Some(task) = &state.task
            && !task.is_finished()
        {
            debug!("TelemetryPoller already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        state.shutdown_tx = Some(shutdown_tx);
        state.task = Some(tokio::spawn(poll_loop(self.context.clone(), shutdown_rx)));

        info!(
            trainers = self.context.trainers.len(),
            interval = ?self.context.interval,
            "Telemetry polling started"
        );
        true
    }

    /// Stop polling; false if it was not running
    ///
    /// The shutdown signal interrupts a pass in progress. A task still alive
    /// after the stop timeout is aborted, so nothing is published once this
    /// returns.
    pub async fn stop(&self) -> bool {
        debug!("TelemetryPoller::stop: called");
        let (shutdown_tx, task) = {
            let mut state = self.state.lock().await;
            (state.shutdown_tx.take(), state.task.take())
        };

        let Some(mut task) = task else {
            return false;
        };

        if let Some(shutdown_tx) = shutdown_tx {
            let _ = shutdown_tx.try_send(());
        }

        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(_) => info!("Telemetry polling stopped"),
            Err(_) => {
                warn!(timeout = ?self.stop_timeout, "Polling task did not exit in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

async fn poll_loop(context: Arc<PollContext>, mut shutdown_rx: mpsc::Receiver<()>) {
    debug!("poll_loop: called");
    let mut interval = tokio::time::interval(context.interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.recv() => {
                debug!("poll_loop: shutdown signal received");
                break;
            }
        }

        // A pass over slow trainers can outlast one tick
        tokio::select! {
            _ = poll_once(&context) => {}
            _ = shutdown_rx.recv() => {
                debug!("poll_loop: shutdown signal received mid-pass");
                break;
            }
        }
    }
}

/// One pass over every known trainer
async fn poll_once(context: &PollContext) {
    for trainer in &context.trainers {
        let reading = match tokio::time::timeout(context.interval, context.source.poll(trainer)).await {
            Ok(Ok(Some(reading))) => reading,
            Ok(Ok(None)) => {
                debug!(%trainer, "No data");
                continue;
            }
            Ok(Err(e)) => {
                warn!(%trainer, error = %e, "Poll failed");
                continue;
            }
            Err(_) => {
                warn!(%trainer, "Poll timed out");
                continue;
            }
        };

        let ftp = match context.registry.ftp_or_default(trainer).await {
            Ok(ftp) => ftp,
            Err(e) => {
                error!(%trainer, error = %e, "FTP lookup failed, using default");
                DEFAULT_FTP_WATTS
            }
        };
        let percent_ftp = percent_of_ftp(reading.power_watts, ftp);
        debug!(%trainer, watts = reading.power_watts, percent_ftp, rpm = reading.cadence_rpm, "Reading");

        let power = Message::SetMeasuredPower {
            uuid_trainer: trainer.clone(),
            measured_power: reading.power_watts,
            percent_ftp,
        };
        if let Err(e) = context.publisher.publish(&power).await {
            error!(%trainer, error = %e, "Failed to publish measured power");
        }

        let cadence = Message::SetMeasuredCadence {
            uuid_trainer: trainer.clone(),
            measured_cadence: reading.cadence_rpm,
        };
        if let Err(e) = context.publisher.publish(&cadence).await {
            error!(%trainer, error = %e, "Failed to publish measured cadence");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::telemetry::{Reading, TelemetryError};
    use crate::bus::{Broker, BusConfig, BusHandle};
    use crate::contract::decode;
    use async_trait::async_trait;

    const NS: &str = "app";

    /// Fixed readings; "silent" has no data, "broken" errors, "slow" hangs
    struct FixedSource;

    #[async_trait]
    impl TrainerSource for FixedSource {
        async fn discover(&self) -> Vec<String> {
            vec!["steady".to_string()]
        }

        async fn poll(&self, trainer: &str) -> Result<Option<Reading>, TelemetryError> {
            match trainer {
                "steady" => Ok(Some(Reading {
                    power_watts: 150.0,
                    cadence_rpm: 88.0,
                })),
                "silent" => Ok(None),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(None)
                }
                other => Err(TelemetryError::Unavailable(other.to_string())),
            }
        }

        async fn apply_target_watts(&self, _trainer: &str, _watts: f64) -> Result<(), TelemetryError> {
            Ok(())
        }
    }

    async fn setup(trainers: &[&str]) -> (TelemetryPoller, RegistryManager, BusHandle) {
        let broker = Broker::new(BusConfig::default());
        let listener = broker.connect().await.unwrap();
        let publisher = Publisher::new(broker.connect().await.unwrap(), NS, "bridge");
        tokio::spawn(broker.run());
        listener.subscribe("app/#").await.unwrap();

        let registry = RegistryManager::spawn();
        let timing = PollTiming {
            interval: Duration::from_millis(40),
            stop_timeout: Duration::from_millis(200),
        };
        let poller = TelemetryPoller::new(
            publisher,
            registry.clone(),
            Arc::new(FixedSource),
            trainers.iter().map(|t| t.to_string()).collect(),
            timing,
        );
        (poller, registry, listener)
    }

    fn drain(listener: &BusHandle) -> Vec<Message> {
        let mut out = vec![];
        while let Some(envelope) = listener.try_recv() {
            out.push(decode(NS, &envelope).unwrap().message);
        }
        out
    }

    #[tokio::test]
    async fn test_publishes_power_and_cadence() {
        let (poller, registry, listener) = setup(&["steady"]).await;
        registry.set_ftp("steady", 200).await.unwrap();

        assert!(poller.start().await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(poller.stop().await);

        let messages = drain(&listener);
        assert_eq!(
            &messages[..2],
            &[
                Message::SetMeasuredPower {
                    uuid_trainer: "steady".to_string(),
                    measured_power: 150.0,
                    percent_ftp: 75,
                },
                Message::SetMeasuredCadence {
                    uuid_trainer: "steady".to_string(),
                    measured_cadence: 88.0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_default_ftp_when_unset() {
        let (poller, _, listener) = setup(&["steady"]).await;

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.stop().await;

        let percent = drain(&listener).into_iter().find_map(|m| match m {
            Message::SetMeasuredPower { percent_ftp, .. } => Some(percent_ftp),
            _ => None,
        });
        assert_eq!(percent, Some(150));
    }

    #[tokio::test]
    async fn test_skips_silent_and_failing_trainers() {
        let (poller, _, listener) = setup(&["silent", "broken", "steady"]).await;

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.stop().await;

        let messages = drain(&listener);
        assert!(!messages.is_empty());
        for message in messages {
            match message {
                Message::SetMeasuredPower { uuid_trainer, .. } | Message::SetMeasuredCadence { uuid_trainer, .. } => {
                    assert_eq!(uuid_trainer, "steady")
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_slow_trainer_does_not_stall_others() {
        let (poller, _, listener) = setup(&["slow", "steady"]).await;

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await;

        let steady = drain(&listener)
            .into_iter()
            .filter(|m| matches!(m, Message::SetMeasuredPower { .. }))
            .count();
        assert!(steady >= 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_pass_over_slow_trainers() {
        let (poller, _, listener) = setup(&["slow", "slow", "slow", "steady"]).await;

        poller.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = std::time::Instant::now();
        assert!(poller.stop().await);
        assert!(started.elapsed() < Duration::from_millis(80), "stop took {:?}", started.elapsed());
        assert!(!poller.is_running().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        drain(&listener);

        // The pass would have reached "steady" about 120ms after start
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(drain(&listener).is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let (poller, _, _) = setup(&["steady"]).await;

        assert!(!poller.stop().await);
        assert!(poller.start().await);
        assert!(!poller.start().await);
        assert!(poller.is_running().await);
        assert!(poller.stop().await);
        assert!(!poller.stop().await);
        assert!(!poller.is_running().await);
    }
}
