//! Bridge - device proxy between the bus and the trainers
//!
//! Owns the pairing and FTP registries (through the registry actor), turns
//! percent-of-FTP targets into watts for each trainer, and runs the telemetry
//! poller that republishes readings.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::poller::{PollTiming, TelemetryPoller};
use super::telemetry::TrainerSource;
use crate::contract::{Agent, Message, MessageKind, Publisher};
use crate::domain::target_watts;
use crate::registry::{RegistryError, RegistryManager};

pub struct Bridge {
    publisher: Publisher,
    registry: RegistryManager,
    source: Arc<dyn TrainerSource>,
    trainers: Vec<String>,
    applied: Mutex<BTreeMap<String, f64>>,
    poller: TelemetryPoller,
}

impl Bridge {
    /// Create a Bridge for `trainers`, or for every trainer the source
    /// discovers when the list is empty
    pub async fn new(
        publisher: Publisher,
        registry: RegistryManager,
        source: Arc<dyn TrainerSource>,
        trainers: Vec<String>,
        timing: PollTiming,
    ) -> Self {
        let trainers = if trainers.is_empty() {
            source.discover().await
        } else {
            trainers
        };
        info!(?trainers, "Bridge created");

        let poller = TelemetryPoller::new(
            publisher.clone(),
            registry.clone(),
            source.clone(),
            trainers.clone(),
            timing,
        );
        Self {
            publisher,
            registry,
            source,
            trainers,
            applied: Mutex::new(BTreeMap::new()),
            poller,
        }
    }

    /// Start telemetry polling; false if already running
    pub async fn start(&self) -> bool {
        self.poller.start().await
    }

    /// Stop telemetry polling; false if it was not running
    pub async fn stop(&self) -> bool {
        self.poller.stop().await
    }

    pub async fn is_polling(&self) -> bool {
        self.poller.is_running().await
    }

    pub fn trainers(&self) -> &[String] {
        &self.trainers
    }

    pub fn registry(&self) -> &RegistryManager {
        &self.registry
    }

    /// Last watts applied to a trainer by a target command
    pub async fn applied_watts(&self, trainer: &str) -> Option<f64> {
        self.applied.lock().await.get(trainer).copied()
    }

    async fn handle_list_devices(&self) {
        debug!("Bridge::handle_list_devices: called");
        let reply = Message::DeviceList {
            device_list: self.trainers.clone(),
        };
        if let Err(e) = self.publisher.publish(&reply).await {
            error!(error = %e, "Failed to publish device list");
        }
    }

    async fn handle_pairing(&self, trainer: String, rider: Option<String>) -> Result<(), RegistryError> {
        debug!(%trainer, ?rider, "Bridge::handle_pairing: called");
        match rider {
            Some(rider) => {
                let previous = self.registry.pair(&trainer, &rider).await?;
                info!(%trainer, %rider, ?previous, "Trainer paired");
            }
            None => {
                let previous = self.registry.unpair(&trainer).await?;
                info!(%trainer, ?previous, "Trainer unpaired");
            }
        }
        Ok(())
    }

    async fn handle_set_ftp(&self, trainer: String, ftp: u32) -> Result<(), RegistryError> {
        debug!(%trainer, ftp, "Bridge::handle_set_ftp: called");
        if ftp == 0 {
            warn!(%trainer, "Rejecting FTP of 0");
            return Ok(());
        }
        self.registry.set_ftp(&trainer, ftp).await?;
        info!(%trainer, ftp, "FTP set");
        Ok(())
    }

    async fn handle_request_ftp(&self, trainer: String) -> Result<(), RegistryError> {
        debug!(%trainer, "Bridge::handle_request_ftp: called");
        let ftp = self.registry.ftp_or_default(&trainer).await?;
        let reply = Message::FtpValue {
            uuid_trainer: trainer,
            ftp,
        };
        if let Err(e) = self.publisher.publish(&reply).await {
            error!(error = %e, "Failed to publish ftp value");
        }
        Ok(())
    }

    /// Paired trainers, or every known trainer when nothing is paired
    async fn target_trainers(&self) -> Result<Vec<String>, RegistryError> {
        let paired: Vec<String> = self
            .registry
            .pairings()
            .await?
            .into_iter()
            .map(|(trainer, _)| trainer)
            .collect();
        if paired.is_empty() {
            Ok(self.trainers.clone())
        } else {
            Ok(paired)
        }
    }

    async fn handle_target_power(&self, percent: u32) -> Result<(), RegistryError> {
        debug!(percent, "Bridge::handle_target_power: called");
        for trainer in self.target_trainers().await? {
            let ftp = self.registry.ftp_or_default(&trainer).await?;
            let watts = target_watts(ftp, percent);

            match self.source.apply_target_watts(&trainer, watts).await {
                Ok(()) => {
                    info!(%trainer, percent, ftp, watts, "Target power applied");
                    self.applied.lock().await.insert(trainer, watts);
                }
                Err(e) => warn!(%trainer, watts, error = %e, "Failed to apply target power"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for Bridge {
    fn name(&self) -> &str {
        "bridge"
    }

    fn handles(&self) -> Vec<MessageKind> {
        vec![
            MessageKind::ListDevices,
            MessageKind::PairTrainerRider,
            MessageKind::SetFtp,
            MessageKind::RequestFtp,
            MessageKind::SetTargetPower,
        ]
    }

    async fn handle(&self, message: Message) {
        let kind = message.kind();
        let result = match message {
            Message::ListDevices => {
                self.handle_list_devices().await;
                Ok(())
            }
            Message::PairTrainerRider {
                uuid_trainer,
                uuid_rider,
            } => self.handle_pairing(uuid_trainer, uuid_rider).await,
            Message::SetFtp { uuid_trainer, ftp } => self.handle_set_ftp(uuid_trainer, ftp).await,
            Message::RequestFtp { uuid_trainer } => self.handle_request_ftp(uuid_trainer).await,
            Message::SetTargetPower { target_power } => self.handle_target_power(target_power).await,
            other => {
                debug!(kind = %other.kind(), "Bridge: ignoring");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(%kind, error = %e, "Bridge handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SimulatedTrainers;
    use crate::bus::{Broker, BusConfig, BusHandle};
    use crate::contract::{decode, spawn_agent};
    use crate::domain::DEFAULT_FTP_WATTS;
    use std::time::Duration;

    const NS: &str = "app";

    struct Fixture {
        bridge: Arc<Bridge>,
        source: Arc<SimulatedTrainers>,
        peer: Publisher,
        listener: BusHandle,
    }

    async fn setup() -> Fixture {
        let broker = Broker::new(BusConfig::default());
        let bridge_bus = broker.connect().await.unwrap();
        let peer = Publisher::new(broker.connect().await.unwrap(), NS, "coach");
        let listener = broker.connect().await.unwrap();
        tokio::spawn(broker.run());
        listener.subscribe("app/#").await.unwrap();

        let source = Arc::new(SimulatedTrainers::default());
        let bridge = Arc::new(
            Bridge::new(
                Publisher::new(bridge_bus.clone(), NS, "bridge"),
                RegistryManager::spawn(),
                source.clone(),
                vec![],
                PollTiming::default(),
            )
            .await,
        );
        spawn_agent(bridge.clone(), bridge_bus, NS).await.unwrap();
        Fixture {
            bridge,
            source,
            peer,
            listener,
        }
    }

    fn drain(listener: &BusHandle) -> Vec<Message> {
        let mut out = vec![];
        while let Some(envelope) = listener.try_recv() {
            out.push(decode(NS, &envelope).unwrap().message);
        }
        out
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_list_devices_answers_with_discovered_trainers() {
        let f = setup().await;

        f.peer.publish(&Message::ListDevices).await.unwrap();
        settle().await;

        assert_eq!(
            drain(&f.listener).last(),
            Some(&Message::DeviceList {
                device_list: vec![
                    "trainer_123".to_string(),
                    "trainer_456".to_string(),
                    "trainer_789".to_string()
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_target_power_uses_ftp() {
        let f = setup().await;

        f.peer
            .publish(&Message::PairTrainerRider {
                uuid_trainer: "trainer_123".to_string(),
                uuid_rider: Some("rider_001".to_string()),
            })
            .await
            .unwrap();
        f.peer
            .publish(&Message::SetFtp {
                uuid_trainer: "trainer_123".to_string(),
                ftp: 250,
            })
            .await
            .unwrap();
        f.peer
            .publish(&Message::SetTargetPower { target_power: 80 })
            .await
            .unwrap();
        settle().await;

        assert_eq!(f.bridge.applied_watts("trainer_123").await, Some(200.0));
        assert_eq!(f.source.target("trainer_123").await, Some(200.0));
        assert_eq!(f.bridge.applied_watts("trainer_456").await, None);
    }

    #[tokio::test]
    async fn test_target_power_without_pairings_reaches_all_at_default_ftp() {
        let f = setup().await;

        f.peer
            .publish(&Message::SetTargetPower { target_power: 75 })
            .await
            .unwrap();
        settle().await;

        for trainer in f.bridge.trainers() {
            assert_eq!(f.bridge.applied_watts(trainer).await, Some(75.0));
        }
    }

    #[tokio::test]
    async fn test_unpair_removes_pairing() {
        let f = setup().await;

        f.peer
            .publish(&Message::PairTrainerRider {
                uuid_trainer: "trainer_456".to_string(),
                uuid_rider: Some("rider_001".to_string()),
            })
            .await
            .unwrap();
        settle().await;
        assert_eq!(
            f.bridge.registry().rider_for("trainer_456").await.unwrap(),
            Some("rider_001".to_string())
        );

        f.peer
            .publish(&Message::PairTrainerRider {
                uuid_trainer: "trainer_456".to_string(),
                uuid_rider: None,
            })
            .await
            .unwrap();
        settle().await;
        assert_eq!(f.bridge.registry().rider_for("trainer_456").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ftp_is_rejected() {
        let f = setup().await;

        f.peer
            .publish(&Message::SetFtp {
                uuid_trainer: "trainer_123".to_string(),
                ftp: 0,
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(f.bridge.registry().ftp("trainer_123").await.unwrap(), None);
        assert_eq!(
            f.bridge.registry().ftp_or_default("trainer_123").await.unwrap(),
            DEFAULT_FTP_WATTS
        );
    }

    #[tokio::test]
    async fn test_request_ftp_answers_stored_or_default() {
        let f = setup().await;

        f.peer
            .publish(&Message::SetFtp {
                uuid_trainer: "trainer_123".to_string(),
                ftp: 230,
            })
            .await
            .unwrap();
        f.peer
            .publish(&Message::RequestFtp {
                uuid_trainer: "trainer_123".to_string(),
            })
            .await
            .unwrap();
        f.peer
            .publish(&Message::RequestFtp {
                uuid_trainer: "trainer_999".to_string(),
            })
            .await
            .unwrap();
        settle().await;

        let answers: Vec<Message> = drain(&f.listener)
            .into_iter()
            .filter(|m| m.kind() == MessageKind::FtpValue)
            .collect();
        assert_eq!(
            answers,
            vec![
                Message::FtpValue {
                    uuid_trainer: "trainer_123".to_string(),
                    ftp: 230
                },
                Message::FtpValue {
                    uuid_trainer: "trainer_999".to_string(),
                    ftp: DEFAULT_FTP_WATTS
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_start_stop_polling() {
        let f = setup().await;

        assert!(f.bridge.start().await);
        assert!(!f.bridge.start().await);
        assert!(f.bridge.is_polling().await);
        assert!(f.bridge.stop().await);
        assert!(!f.bridge.is_polling().await);
    }
}
