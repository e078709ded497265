//! PlanPlayer - timed playback of a training plan
//!
//! Playback runs as one background task per session. Each segment waits out
//! its delay on a cancellable timer, then broadcasts the segment's targets.
//! Stopping sends on a shutdown channel the task selects on, so a stop is
//! observed mid-delay rather than at the next segment boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::contract::{Message, Publisher};
use crate::domain::{Segment, TrainingPlan};

/// How fast a plan is replayed and how long stop waits for the task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTiming {
    /// Wall-clock length of one offset second
    pub tick: Duration,
    pub stop_timeout: Duration,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub running: bool,
    pub current_index: usize,
    pub segment_count: usize,
}

#[derive(Default)]
struct Session {
    running: bool,
    current_index: usize,
    segment_count: usize,
    /// Bumped on every start; a playback task only writes while it matches
    generation: u64,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Drives one session at a time
pub struct PlanPlayer {
    publisher: Publisher,
    cadence: bool,
    timing: PlaybackTiming,
    session: Arc<Mutex<Session>>,
}

impl PlanPlayer {
    pub fn new(publisher: Publisher, cadence: bool, timing: PlaybackTiming) -> Self {
        Self {
            publisher,
            cadence,
            timing,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Start playing `plan`
    ///
    /// Publishes `start_plan` and launches the playback task. Returns false
    /// without doing anything when a session is already running.
    pub async fn start(&self, plan: TrainingPlan) -> bool {
        debug!(segments = plan.len(), "PlanPlayer::start: called");
        let mut session = self.session.lock().await;

        if session.running {
            warn!("Plan already running, ignoring start");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        session.running = true;
        session.current_index = 0;
        session.segment_count = plan.len();
        session.generation += 1;
        session.shutdown_tx = Some(shutdown_tx);

        if let Err(e) = self.publisher.publish(&Message::StartPlan).await {
            error!(error = %e, "Failed to publish start_plan");
        }

        let playback = Playback {
            publisher: self.publisher.clone(),
            cadence: self.cadence,
            tick: self.timing.tick,
            session: self.session.clone(),
            generation: session.generation,
            shutdown_rx,
        };
        session.task = Some(tokio::spawn(playback.run(plan)));

        info!(segments = session.segment_count, "Plan started");
        true
    }

    /// Stop the session
    ///
    /// Always publishes `stop_plan`, even when nothing is running. The publish
    /// and the wait for the playback task are each bounded by the stop
    /// timeout; a task still alive after that is aborted.
    pub async fn stop(&self) {
        debug!("PlanPlayer::stop: called");
        let (shutdown_tx, task) = {
            let mut session = self.session.lock().await;
            session.running = false;
            (session.shutdown_tx.take(), session.task.take())
        };

        if let Some(shutdown_tx) = shutdown_tx {
            let _ = shutdown_tx.try_send(());
        }

        match tokio::time::timeout(self.timing.stop_timeout, self.publisher.publish(&Message::StopPlan)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Failed to publish stop_plan"),
            Err(_) => error!(timeout = ?self.timing.stop_timeout, "Timed out publishing stop_plan"),
        }

        if let Some(mut task) = task {
            match tokio::time::timeout(self.timing.stop_timeout, &mut task).await {
                Ok(_) => debug!("Playback task joined"),
                Err(_) => {
                    warn!(timeout = ?self.timing.stop_timeout, "Playback task did not exit in time, aborting");
                    task.abort();
                }
            }
        }

        info!("Plan stopped");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            running: session.running,
            current_index: session.current_index,
            segment_count: session.segment_count,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.running
    }
}

/// State moved into the playback task
struct Playback {
    publisher: Publisher,
    cadence: bool,
    tick: Duration,
    session: Arc<Mutex<Session>>,
    generation: u64,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Playback {
    async fn run(mut self, plan: TrainingPlan) {
        debug!(segments = plan.len(), "Playback::run: called");

        for (index, (delay, segment)) in plan.delays().enumerate() {
            if delay > 0 {
                let wait = self.tick.saturating_mul(u32::try_from(delay).unwrap_or(u32::MAX));
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.shutdown_rx.recv() => {
                        info!(index, label = %segment.label, "Playback cancelled during delay");
                        return;
                    }
                }
            }

            if self.is_cancelled() {
                info!(index, "Playback cancelled");
                return;
            }

            {
                let mut session = self.session.lock().await;
                if session.generation != self.generation {
                    return;
                }
                session.current_index = index;
            }
            self.publish_targets(index, segment).await;
        }

        if self.is_cancelled() {
            info!("Playback cancelled after last segment");
            return;
        }

        if let Err(e) = self.publisher.publish(&Message::StopPlan).await {
            error!(error = %e, "Failed to publish stop_plan after last segment");
        }

        let mut session = self.session.lock().await;
        if session.generation == self.generation {
            session.running = false;
        }
        info!("Plan completed");
    }

    /// A stop was requested, or the player went away
    fn is_cancelled(&mut self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    async fn publish_targets(&self, index: usize, segment: &Segment) {
        info!(
            index,
            label = %segment.label,
            power = segment.target_power_percent,
            cadence = segment.target_cadence_rpm,
            "Segment reached"
        );

        let power = Message::SetTargetPower {
            target_power: segment.target_power_percent,
        };
        if let Err(e) = self.publisher.publish(&power).await {
            error!(index, error = %e, "Failed to publish target power");
        }

        if self.cadence {
            let cadence = Message::SetTargetCadence {
                target_cadence: segment.target_cadence_rpm,
            };
            if let Err(e) = self.publisher.publish(&cadence).await {
                error!(index, error = %e, "Failed to publish target cadence");
            }
        }
    }
}
