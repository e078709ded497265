//! Coach - plan authority
//!
//! Issues pairing, FTP and plan commands, answers plan requests and drives
//! the [`PlanPlayer`]. Measurements published by the Bridge are logged and the
//! latest value per trainer is kept for display.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::player::{PlanPlayer, PlaybackTiming, SessionSnapshot};
use crate::contract::{Agent, ContractError, Message, MessageKind, Publisher};
use crate::domain::TrainingPlan;

/// Latest telemetry seen for one trainer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurement {
    pub power_watts: Option<f64>,
    pub percent_ftp: Option<i64>,
    pub cadence_rpm: Option<f64>,
}

pub struct Coach {
    publisher: Publisher,
    player: PlanPlayer,
    cadence: bool,
    plan: TrainingPlan,
    devices: Mutex<Vec<String>>,
    pairings: Mutex<BTreeMap<String, String>>,
    measurements: Mutex<BTreeMap<String, Measurement>>,
}

impl Coach {
    pub fn new(publisher: Publisher, plan: TrainingPlan, cadence: bool, timing: PlaybackTiming) -> Self {
        debug!(segments = plan.len(), cadence, "Coach::new: called");
        Self {
            player: PlanPlayer::new(publisher.clone(), cadence, timing),
            publisher,
            cadence,
            plan,
            devices: Mutex::new(Vec::new()),
            pairings: Mutex::new(BTreeMap::new()),
            measurements: Mutex::new(BTreeMap::new()),
        }
    }

    // === Commands ===

    pub async fn request_device_list(&self) -> Result<(), ContractError> {
        debug!("Coach::request_device_list: called");
        self.publisher.publish(&Message::ListDevices).await
    }

    /// Pair a trainer with a rider and remember it locally
    pub async fn pair_device(&self, trainer: &str, rider: &str) -> Result<(), ContractError> {
        debug!(%trainer, %rider, "Coach::pair_device: called");
        self.publisher
            .publish(&Message::PairTrainerRider {
                uuid_trainer: trainer.to_string(),
                uuid_rider: Some(rider.to_string()),
            })
            .await?;
        self.pairings.lock().await.insert(trainer.to_string(), rider.to_string());
        Ok(())
    }

    pub async fn unpair_device(&self, trainer: &str) -> Result<(), ContractError> {
        debug!(%trainer, "Coach::unpair_device: called");
        self.publisher
            .publish(&Message::PairTrainerRider {
                uuid_trainer: trainer.to_string(),
                uuid_rider: None,
            })
            .await?;
        self.pairings.lock().await.remove(trainer);
        Ok(())
    }

    /// Broadcast the current plan
    pub async fn send_training_plan(&self) -> Result<(), ContractError> {
        let training_plan = self.plan.clone();
        debug!(segments = training_plan.len(), "Coach::send_training_plan: called");
        self.publisher.publish(&Message::ListPlan { training_plan }).await
    }

    pub async fn set_ftp(&self, trainer: &str, ftp: u32) -> Result<(), ContractError> {
        debug!(%trainer, ftp, "Coach::set_ftp: called");
        self.publisher
            .publish(&Message::SetFtp {
                uuid_trainer: trainer.to_string(),
                ftp,
            })
            .await
    }

    /// Start playing the current plan; false if already running
    pub async fn start_plan(&self) -> bool {
        let plan = self.plan.clone();
        self.player.start(plan).await
    }

    pub async fn stop_plan(&self) {
        self.player.stop().await;
    }

    /// Manual target outside of plan playback
    pub async fn set_target_power(&self, percent: u32) -> Result<(), ContractError> {
        debug!(percent, "Coach::set_target_power: called");
        self.publisher
            .publish(&Message::SetTargetPower { target_power: percent })
            .await
    }

    pub async fn set_target_cadence(&self, rpm: u32) -> Result<(), ContractError> {
        debug!(rpm, "Coach::set_target_cadence: called");
        self.publisher
            .publish(&Message::SetTargetCadence { target_cadence: rpm })
            .await
    }

    // === Accessors ===

    pub fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    pub async fn devices(&self) -> Vec<String> {
        self.devices.lock().await.clone()
    }

    pub async fn pairings(&self) -> BTreeMap<String, String> {
        self.pairings.lock().await.clone()
    }

    pub async fn measurement(&self, trainer: &str) -> Option<Measurement> {
        self.measurements.lock().await.get(trainer).cloned()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.player.snapshot().await
    }

    // === Inbound ===

    async fn answer_plan_request(&self) {
        if let Err(e) = self.send_training_plan().await {
            error!(error = %e, "Failed to answer get_plan");
        }
    }
}

#[async_trait]
impl Agent for Coach {
    fn name(&self) -> &str {
        "coach"
    }

    fn handles(&self) -> Vec<MessageKind> {
        let mut kinds = vec![MessageKind::DeviceList, MessageKind::GetPlan, MessageKind::SetMeasuredPower];
        if self.cadence {
            kinds.push(MessageKind::SetMeasuredCadence);
        }
        kinds
    }

    async fn handle(&self, message: Message) {
        match message {
            Message::DeviceList { device_list } => {
                info!(devices = ?device_list, "Coach: device list received");
                *self.devices.lock().await = device_list;
            }
            Message::GetPlan => {
                debug!("Coach: plan requested");
                self.answer_plan_request().await;
            }
            Message::SetMeasuredPower {
                uuid_trainer,
                measured_power,
                percent_ftp,
            } => {
                info!(trainer = %uuid_trainer, watts = measured_power, percent_ftp, "Coach: measured power");
                let mut measurements = self.measurements.lock().await;
                let entry = measurements.entry(uuid_trainer).or_default();
                entry.power_watts = Some(measured_power);
                entry.percent_ftp = Some(percent_ftp);
            }
            Message::SetMeasuredCadence {
                uuid_trainer,
                measured_cadence,
            } => {
                info!(trainer = %uuid_trainer, rpm = measured_cadence, "Coach: measured cadence");
                self.measurements
                    .lock()
                    .await
                    .entry(uuid_trainer)
                    .or_default()
                    .cadence_rpm = Some(measured_cadence);
            }
            other => debug!(kind = %other.kind(), "Coach: ignoring"),
        }
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

    async fn setup(cadence: bool) -> (Arc<Coach>, Publisher, BusHandle) {
        let broker = Broker::new(BusConfig::default());
        let coach_bus = broker.connect().await.unwrap();
        let peer = Publisher::new(broker.connect().await.unwrap(), NS, "peer");
        let listener = broker.connect().await.unwrap();
        tokio::spawn(broker.run());

        listener.subscribe("app/#").await.unwrap();
        let plan = TrainingPlan::new(vec![Segment::new(0, 50, 90, "Warmup"), Segment::new(3, 0, 80, "stop")]).unwrap();
        let timing = PlaybackTiming {
            tick: Duration::from_millis(5),
            stop_timeout: Duration::from_millis(100),
        };
        let coach = Arc::new(Coach::new(Publisher::new(coach_bus.clone(), NS, "coach"), plan, cadence, timing));
        spawn_agent(coach.clone(), coach_bus, NS).await.unwrap();
        (coach, peer, listener)
    }

    fn drain(listener: &BusHandle) -> Vec<Message> {
        let mut out = vec![];
        while let Some(envelope) = listener.try_recv() {
            out.push(decode(NS, &envelope).unwrap().message);
        }
        out
    }

    #[tokio::test]
    async fn test_handles_depend_on_cadence() {
        let (coach, _, _) = setup(false).await;
        assert!(!coach.handles().contains(&MessageKind::SetMeasuredCadence));

        let (coach, _, _) = setup(true).await;
        assert!(coach.handles().contains(&MessageKind::SetMeasuredCadence));
    }

    #[tokio::test]
    async fn test_answers_get_plan() {
        let (coach, peer, listener) = setup(false).await;

        peer.publish(&Message::GetPlan).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = drain(&listener);
        assert_eq!(
            messages.last(),
            Some(&Message::ListPlan {
                training_plan: coach.plan().clone()
            })
        );
    }

    #[tokio::test]
    async fn test_pairing_commands_are_tracked() {
        let (coach, _, listener) = setup(false).await;

        coach.pair_device("trainer_123", "rider_001").await.unwrap();
        assert_eq!(coach.pairings().await.get("trainer_123").map(String::as_str), Some("rider_001"));

        coach.unpair_device("trainer_123").await.unwrap();
        assert!(coach.pairings().await.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            drain(&listener),
            vec![
                Message::PairTrainerRider {
                    uuid_trainer: "trainer_123".to_string(),
                    uuid_rider: Some("rider_001".to_string())
                },
                Message::PairTrainerRider {
                    uuid_trainer: "trainer_123".to_string(),
                    uuid_rider: None
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_caches_devices_and_measurements() {
        let (coach, peer, _) = setup(true).await;

        peer.publish(&Message::DeviceList {
            device_list: vec!["trainer_123".to_string(), "trainer_456".to_string()],
        })
        .await
        .unwrap();
        peer.publish(&Message::SetMeasuredPower {
            uuid_trainer: "trainer_123".to_string(),
            measured_power: 150.0,
            percent_ftp: 75,
        })
        .await
        .unwrap();
        peer.publish(&Message::SetMeasuredCadence {
            uuid_trainer: "trainer_123".to_string(),
            measured_cadence: 88.0,
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(coach.devices().await.len(), 2);
        assert_eq!(
            coach.measurement("trainer_123").await,
            Some(Measurement {
                power_watts: Some(150.0),
                percent_ftp: Some(75),
                cadence_rpm: Some(88.0),
            })
        );
        assert_eq!(coach.measurement("trainer_456").await, None);
    }

    #[tokio::test]
    async fn test_start_plan_runs_to_completion() {
        let (coach, _, listener) = setup(false).await;

        assert!(coach.start_plan().await);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(
            drain(&listener),
            vec![
                Message::StartPlan,
                Message::SetTargetPower { target_power: 50 },
                Message::SetTargetPower { target_power: 0 },
                Message::StopPlan,
            ]
        );
        assert!(!coach.snapshot().await.running);
    }
}
