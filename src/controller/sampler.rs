//! Input sampling loop
//!
//! Once per display frame: poll every device, pick the authoritative one,
//! run the mapping table against its snapshot and dispatch whatever fired.
//! The loop never waits on the executor.

use super::device::{select_device, DeviceSource};
use super::frame::FrameTick;
use crate::dispatch::DispatchSender;
use crate::mapping::action::Action;
use crate::mapping::rules::MappingTable;
use crate::mapping::throttle::ThrottleRegistry;
use chrono::Local;
use statum::{machine, state};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Gamepad backend unavailable: {0}")]
    Backend(String),

    #[error("Sampler task failed: {0}")]
    Task(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum SamplerState {
    Initializing,
    Sampling,
}

#[machine]
pub struct InputSampler<S: SamplerState> {
    source: Box<dyn DeviceSource>,
    table: MappingTable,
    registry: ThrottleRegistry,
    dispatch: DispatchSender,
    selected: Option<usize>,
}

impl<S: SamplerState> InputSampler<S> {
    pub fn table(&self) -> &MappingTable {
        &self.table
    }
}

impl InputSampler<Initializing> {
    pub fn create(
        source: Box<dyn DeviceSource>,
        table: MappingTable,
        dispatch: DispatchSender,
    ) -> Self {
        debug!("Creating input sampler with {} rules", table.rules().len());
        Self::new(source, table, ThrottleRegistry::new(), dispatch, None)
    }

    pub fn initialize(self) -> InputSampler<Sampling> {
        info!("Input sampler initialized, transitioning to Sampling state");
        self.transition()
    }
}

impl InputSampler<Sampling> {
    /// Samples one frame and dispatches the actions that fired
    pub fn sample_frame(&mut self, now: Instant) -> Vec<Action> {
        let devices = self.source.sample_devices();
        let device = select_device(&devices);

        let selected = device.map(|d| d.id);
        if selected != self.selected {
            match device {
                Some(d) => info!("Active device: {} ({}, {:?})", d.name, d.id, d.mapping),
                None => warn!("No input device, sampling idles"),
            }
            self.selected = selected;
        }

        let Some(device) = device else {
            return Vec::new();
        };
        let actions = self.table.evaluate(device, &mut self.registry, now);
        for action in &actions {
            info!("Dispatching {}", action);
            self.dispatch.send_action(*action);
        }
        actions
    }

    pub fn registry(&self) -> &ThrottleRegistry {
        &self.registry
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Samples on every frame until `cancel` fires or the frame stream ends
    pub async fn run(mut self, mut frames: mpsc::Receiver<FrameTick>, cancel: CancellationToken) {
        info!("Starting input sampling loop");

        let mut frame_count: u64 = 0;
        let mut action_count: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        loop {
            let tick = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown signal received by sampler");
                    break;
                }
                tick = frames.recv() => match tick {
                    Some(tick) => tick,
                    None => {
                        info!("Frame stream ended");
                        break;
                    }
                },
            };

            frame_count += 1;
            action_count += self.sample_frame(tick.at).len() as u64;

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Sampler stats: {} frames, {} actions in last {} seconds ({:.1} fps)",
                    frame_count,
                    action_count,
                    log_interval.num_seconds(),
                    frame_count as f64 / log_interval.num_seconds() as f64
                );
                frame_count = 0;
                action_count = 0;
                last_log_time = now;
            }
        }
    }
}

pub struct SamplerHandle {
    task: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    pub fn spawn(
        source: Box<dyn DeviceSource>,
        table: MappingTable,
        dispatch: DispatchSender,
        frames: mpsc::Receiver<FrameTick>,
        cancel: CancellationToken,
    ) -> Self {
        let sampler = InputSampler::create(source, table, dispatch);
        info!("Spawning input sampler task");
        let task = tokio::spawn(async move {
            sampler.initialize().run(frames, cancel).await;
            info!("Input sampler stopped");
        });
        Self { task: Some(task) }
    }

    pub async fn join(&mut self) -> Result<(), SamplerError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                error!("Sampler task panicked: {}", e);
                SamplerError::Task(e.to_string())
            }),
            None => Ok(()),
        }
    }
}
