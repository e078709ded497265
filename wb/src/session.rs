//! In-process session: Coach, Rider and Bridge on one bus
//!
//! Used by `wb session` and by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::bus::{Broker, BusHandle};
use crate::coach::Coach;
use crate::config::Config;
use crate::contract::{Publisher, spawn_agent};
use crate::domain::TrainingPlan;
use crate::registry::RegistryManager;
use crate::rider::Rider;

pub struct Session {
    config: Config,
    bus: BusHandle,
    agent_buses: Vec<BusHandle>,
    coach: Arc<Coach>,
    rider: Arc<Rider>,
    bridge: Arc<Bridge>,
    registry: RegistryManager,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Start the broker and all three agents, subscribed and idle
    pub async fn launch(config: Config, plan: TrainingPlan) -> Result<Self> {
        debug!(segments = plan.len(), "Session::launch: called");
        config.validate()?;
        let namespace = config.bus.namespace.clone();

        let broker = Broker::new(config.bus.clone());
        let control = broker.connect().await?;
        let coach_bus = broker.connect().await?;
        let rider_bus = broker.connect().await?;
        let bridge_bus = broker.connect().await?;
        let mut tasks = vec![tokio::spawn(broker.run())];

        let registry = RegistryManager::spawn();
        let bridge = Arc::new(
            Bridge::new(
                Publisher::new(bridge_bus.clone(), &namespace, "bridge"),
                registry.clone(),
                Arc::new(config.bridge.simulation()),
                config.bridge.trainers.clone(),
                config.bridge.timing(),
            )
            .await,
        );
        let rider = Arc::new(Rider::new(
            Publisher::new(rider_bus.clone(), &namespace, "rider"),
            config.rider.rider_id.clone(),
            config.rider.cadence,
        ));
        let coach = Arc::new(Coach::new(
            Publisher::new(coach_bus.clone(), &namespace, "coach"),
            plan,
            config.coach.cadence,
            config.coach.timing(),
        ));

        let agent_buses = vec![bridge_bus.clone(), rider_bus.clone(), coach_bus.clone()];
        tasks.push(spawn_agent(bridge.clone(), bridge_bus, &namespace).await?);
        tasks.push(spawn_agent(rider.clone(), rider_bus, &namespace).await?);
        tasks.push(spawn_agent(coach.clone(), coach_bus, &namespace).await?);

        info!(%namespace, "Session launched");
        Ok(Self {
            config,
            bus: control,
            agent_buses,
            coach,
            rider,
            bridge,
            registry,
            tasks,
        })
    }

    /// Run the opening exchange and start the plan
    ///
    /// Bridge starts polling; Rider lists devices, pairs with the session
    /// trainer, sets its FTP and asks for the plan; then Coach starts playback.
    pub async fn begin(&self) -> Result<()> {
        let trainer = &self.config.session.trainer;
        debug!(%trainer, ftp = self.config.session.ftp, "Session::begin: called");

        self.bridge.start().await;
        self.rider.list_devices().await.context("Failed to request device list")?;
        self.rider.pair(trainer).await.context("Failed to pair trainer")?;
        self.rider
            .set_ftp(trainer, self.config.session.ftp)
            .await
            .context("Failed to set FTP")?;
        self.rider.request_plan().await.context("Failed to request plan")?;

        if !self.coach.start_plan().await {
            info!("Plan was already running");
        }
        Ok(())
    }

    /// Resolves once the plan has stopped running
    pub async fn finished(&self) {
        let poll = Duration::from_millis(self.config.coach.tick_ms.clamp(1, 250));
        while self.coach.snapshot().await.running {
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop playback and polling, then tear down the bus
    ///
    /// Agents are disconnected before the Broker stops, so their inbox loops
    /// end on a closed inbox.
    pub async fn shutdown(self) -> Result<()> {
        debug!("Session::shutdown: called");
        if self.coach.snapshot().await.running {
            self.coach.stop_plan().await;
        }
        self.bridge.stop().await;
        self.registry.shutdown().await?;

        let metrics = self.bus.metrics().await?;
        info!(
            published = metrics.messages_published,
            delivered = metrics.messages_delivered,
            dropped = metrics.messages_dropped,
            "Bus metrics at shutdown"
        );

        for bus in &self.agent_buses {
            if let Err(e) = bus.disconnect().await {
                warn!(client_id = %bus.client_id(), error = %e, "Failed to disconnect agent");
            }
        }
        self.bus.shutdown().await?;
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }
        info!("Session shut down");
        Ok(())
    }

    pub fn coach(&self) -> &Arc<Coach> {
        &self.coach
    }

    pub fn rider(&self) -> &Arc<Rider> {
        &self.rider
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Extra connection to the same bus, for observers
    pub fn bus(&self) -> &BusHandle {
        &self.bus
    }
}
