//! Rider - passive session participant
//!
//! Issues requests on behalf of one rider and keeps the most recent message
//! seen on each subscribed topic for a display to read.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::contract::{Agent, ContractError, Message, MessageKind, Publisher};
use crate::domain::TrainingPlan;

pub struct Rider {
    publisher: Publisher,
    rider_id: String,
    cadence: bool,
    latest: Mutex<HashMap<MessageKind, Message>>,
}

impl Rider {
    pub fn new(publisher: Publisher, rider_id: impl Into<String>, cadence: bool) -> Self {
        let rider_id = rider_id.into();
        debug!(%rider_id, cadence, "Rider::new: called");
        Self {
            publisher,
            rider_id,
            cadence,
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn rider_id(&self) -> &str {
        &self.rider_id
    }

    // === Requests ===

    pub async fn list_devices(&self) -> Result<(), ContractError> {
        self.publisher.publish(&Message::ListDevices).await
    }

    /// Pair this rider with a trainer
    pub async fn pair(&self, trainer: &str) -> Result<(), ContractError> {
        debug!(rider = %self.rider_id, %trainer, "Rider::pair: called");
        self.publisher
            .publish(&Message::PairTrainerRider {
                uuid_trainer: trainer.to_string(),
                uuid_rider: Some(self.rider_id.clone()),
            })
            .await
    }

    pub async fn unpair(&self, trainer: &str) -> Result<(), ContractError> {
        debug!(rider = %self.rider_id, %trainer, "Rider::unpair: called");
        self.publisher
            .publish(&Message::PairTrainerRider {
                uuid_trainer: trainer.to_string(),
                uuid_rider: None,
            })
            .await
    }

    pub async fn request_plan(&self) -> Result<(), ContractError> {
        self.publisher.publish(&Message::GetPlan).await
    }

    pub async fn set_ftp(&self, trainer: &str, ftp: u32) -> Result<(), ContractError> {
        debug!(rider = %self.rider_id, %trainer, ftp, "Rider::set_ftp: called");
        self.publisher
            .publish(&Message::SetFtp {
                uuid_trainer: trainer.to_string(),
                ftp,
            })
            .await
    }

    pub async fn request_ftp(&self, trainer: &str) -> Result<(), ContractError> {
        self.publisher
            .publish(&Message::RequestFtp {
                uuid_trainer: trainer.to_string(),
            })
            .await
    }

    // === Cached state ===

    /// Most recent message received for `kind`
    pub async fn latest(&self, kind: MessageKind) -> Option<Message> {
        self.latest.lock().await.get(&kind).cloned()
    }

    pub async fn devices(&self) -> Option<Vec<String>> {
        match self.latest(MessageKind::DeviceList).await? {
            Message::DeviceList { device_list } => Some(device_list),
            _ => None,
        }
    }

    pub async fn plan(&self) -> Option<TrainingPlan> {
        match self.latest(MessageKind::ListPlan).await? {
            Message::ListPlan { training_plan } => Some(training_plan),
            _ => None,
        }
    }

    /// True between a start_plan and the next stop_plan
    pub async fn session_active(&self) -> bool {
        // start and stop evict each other from the cache
        self.latest.lock().await.contains_key(&MessageKind::StartPlan)
    }

    pub async fn target_power(&self) -> Option<u32> {
        match self.latest(MessageKind::SetTargetPower).await? {
            Message::SetTargetPower { target_power } => Some(target_power),
            _ => None,
        }
    }

    pub async fn target_cadence(&self) -> Option<u32> {
        match self.latest(MessageKind::SetTargetCadence).await? {
            Message::SetTargetCadence { target_cadence } => Some(target_cadence),
            _ => None,
        }
    }

    pub async fn ftp(&self) -> Option<(String, u32)> {
        match self.latest(MessageKind::FtpValue).await? {
            Message::FtpValue { uuid_trainer, ftp } => Some((uuid_trainer, ftp)),
            _ => None,
        }
    }
}

#[async_trait]
impl Agent for Rider {
    fn name(&self) -> &str {
        "rider"
    }

    fn handles(&self) -> Vec<MessageKind> {
        let mut kinds = vec![
            MessageKind::DeviceList,
            MessageKind::ListPlan,
            MessageKind::FtpValue,
            MessageKind::StartPlan,
            MessageKind::StopPlan,
            MessageKind::SetTargetPower,
            MessageKind::SetMeasuredPower,
        ];
        if self.cadence {
            kinds.extend(MessageKind::ALL.into_iter().filter(|kind| kind.is_cadence()));
        }
        kinds
    }

    async fn handle(&self, message: Message) {
        let kind = message.kind();
        match &message {
            Message::StartPlan => info!(rider = %self.rider_id, "Session started"),
            Message::StopPlan => info!(rider = %self.rider_id, "Session stopped"),
            Message::SetTargetPower { target_power } => {
                info!(rider = %self.rider_id, target_power, "Target power")
            }
            Message::SetTargetCadence { target_cadence } => {
                info!(rider = %self.rider_id, target_cadence, "Target cadence")
            }
            Message::ListPlan { training_plan } => {
                info!(rider = %self.rider_id, segments = training_plan.len(), "Plan received")
            }
            _ => debug!(rider = %self.rider_id, %kind, "Cached"),
        }

        let mut latest = self.latest.lock().await;
        match kind {
            MessageKind::StartPlan => {
                latest.remove(&MessageKind::StopPlan);
            }
            MessageKind::StopPlan => {
                latest.remove(&MessageKind::StartPlan);
            }
            _ => {}
        }
        latest.insert(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Broker, BusConfig, BusHandle};
    use crate::contract::{decode, spawn_agent};
    use crate::domain::Segment;
    use std::sync::Arc;
    use std::time::Duration;

    const NS: &str = "app";

    async fn setup(cadence: bool) -> (Arc<Rider>, Publisher, BusHandle) {
        let broker = Broker::new(BusConfig::default());
        let rider_bus = broker.connect().await.unwrap();
        let peer = Publisher::new(broker.connect().await.unwrap(), NS, "coach");
        let listener = broker.connect().await.unwrap();
        tokio::spawn(broker.run());
        listener.subscribe("app/#").await.unwrap();

        let rider = Arc::new(Rider::new(Publisher::new(rider_bus.clone(), NS, "rider"), "rider_001", cadence));
        spawn_agent(rider.clone(), rider_bus, NS).await.unwrap();
        (rider, peer, listener)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_requests_carry_rider_id() {
        let (rider, _, listener) = setup(false).await;

        rider.list_devices().await.unwrap();
        rider.pair("trainer_123").await.unwrap();
        rider.set_ftp("trainer_123", 220).await.unwrap();
        rider.request_plan().await.unwrap();
        settle().await;

        let mut sent = vec![];
        while let Some(envelope) = listener.try_recv() {
            sent.push(decode(NS, &envelope).unwrap().message);
        }
        assert_eq!(
            sent,
            vec![
                Message::ListDevices,
                Message::PairTrainerRider {
                    uuid_trainer: "trainer_123".to_string(),
                    uuid_rider: Some("rider_001".to_string())
                },
                Message::SetFtp {
                    uuid_trainer: "trainer_123".to_string(),
                    ftp: 220
                },
                Message::GetPlan,
            ]
        );
    }

    #[tokio::test]
    async fn test_caches_latest_per_topic() {
        let (rider, peer, _) = setup(false).await;

        let plan = TrainingPlan::new(vec![Segment::new(0, 50, 90, "Warmup")]).unwrap();
        peer.publish(&Message::DeviceList {
            device_list: vec!["trainer_123".to_string()],
        })
        .await
        .unwrap();
        peer.publish(&Message::ListPlan {
            training_plan: plan.clone(),
        })
        .await
        .unwrap();
        peer.publish(&Message::SetTargetPower { target_power: 50 }).await.unwrap();
        peer.publish(&Message::SetTargetPower { target_power: 100 }).await.unwrap();
        peer.publish(&Message::FtpValue {
            uuid_trainer: "trainer_123".to_string(),
            ftp: 240,
        })
        .await
        .unwrap();
        settle().await;

        assert_eq!(rider.devices().await, Some(vec!["trainer_123".to_string()]));
        assert_eq!(rider.plan().await, Some(plan));
        assert_eq!(rider.target_power().await, Some(100));
        assert_eq!(rider.ftp().await, Some(("trainer_123".to_string(), 240)));
    }

    #[tokio::test]
    async fn test_session_active_follows_start_and_stop() {
        let (rider, peer, _) = setup(false).await;
        assert!(!rider.session_active().await);

        peer.publish(&Message::StartPlan).await.unwrap();
        settle().await;
        assert!(rider.session_active().await);

        peer.publish(&Message::StopPlan).await.unwrap();
        settle().await;
        assert!(!rider.session_active().await);
    }

    #[tokio::test]
    async fn test_cadence_only_when_enabled() {
        let (rider, peer, _) = setup(false).await;
        peer.publish(&Message::SetTargetCadence { target_cadence: 90 }).await.unwrap();
        settle().await;
        assert_eq!(rider.target_cadence().await, None);

        let (rider, peer, _) = setup(true).await;
        peer.publish(&Message::SetTargetCadence { target_cadence: 90 }).await.unwrap();
        settle().await;
        assert_eq!(rider.target_cadence().await, Some(90));
    }
}
