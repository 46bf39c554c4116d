//! Command executor, the privileged side of the dispatch channel
//!
//! Applies validated [`Command`]s to whatever surface is attached. Every
//! surface operation runs as its own task, so a slow or reloading page never
//! stalls the command stream, and surface errors end in a debug log. Key
//! tasks are chained and reach the surface in dispatch order; volume
//! evaluations may overlap.
//!
//! ```text
//! Initializing ──start──► Running ──(shutdown | senders gone)──► done
//! ```

pub mod volume;

use crate::config::AppConfig;
use crate::dispatch::{Command, DispatchReceiver, KeyCode};
use crate::mapping::action::VolumeSign;
use crate::osd::{percent_for, OsdController};
use crate::surface::{KeyEvent, KeyEventKind, Script, SurfaceSlot, TargetSurface};
use serde::Deserialize;
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Executor has stopped")]
    Stopped,

    #[error("Executor lifecycle queue is full")]
    Busy,

    #[error("Executor task failed: {0}")]
    Task(String),
}

/// Notifications from the host about the attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A document finished loading; its injected state is fresh
    Loaded,
}

/// Result object of [`Script::AdjustVolume`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VolumeReport {
    pub ok: bool,
    pub volume: Option<f64>,
    pub changed: Option<u64>,
    pub reason: Option<String>,
}

#[state]
#[derive(Debug, Clone)]
pub enum ExecutorState {
    Initializing,
    Running,
}

#[machine]
pub struct CommandExecutor<S: ExecutorState> {
    commands: DispatchReceiver,
    surface: SurfaceSlot,
    osd: Arc<OsdController>,
    step: f64,
    lifecycle: mpsc::Receiver<SurfaceEvent>,
    close: CancellationToken,
    // completion of the most recently queued key press
    key_lane: Option<oneshot::Receiver<()>>,
}

impl<S: ExecutorState> CommandExecutor<S> {
    pub fn surface(&self) -> &SurfaceSlot {
        &self.surface
    }
}

impl CommandExecutor<Initializing> {
    pub fn create(
        commands: DispatchReceiver,
        surface: SurfaceSlot,
        config: &AppConfig,
        lifecycle: mpsc::Receiver<SurfaceEvent>,
        close: CancellationToken,
    ) -> Self {
        debug!(
            "Creating command executor (step {}, dwell {}ms)",
            config.volume.step, config.osd.dwell_ms
        );
        Self::new(
            commands,
            surface,
            Arc::new(OsdController::new(config.osd.dwell())),
            config.volume.step,
            lifecycle,
            close,
            None,
        )
    }

    pub fn start(self) -> CommandExecutor<Running> {
        info!("Command executor running");
        self.transition()
    }
}

impl CommandExecutor<Running> {
    /// Applies one command; returns the task carrying its surface work
    pub fn execute(&mut self, command: Command) -> Option<JoinHandle<()>> {
        match command {
            Command::Close => {
                info!("Close requested by surface");
                self.close.cancel();
                None
            }
            Command::Key(key) => {
                let surface = self.attached()?;
                let previous = self.key_lane.take();
                let (done_tx, done_rx) = oneshot::channel();
                self.key_lane = Some(done_rx);
                Some(tokio::spawn(async move {
                    if let Some(previous) = previous {
                        // an aborted predecessor drops its sender, which also releases us
                        let _ = previous.await;
                    }
                    press_key(surface, key).await;
                    let _ = done_tx.send(());
                }))
            }
            Command::Volume(sign) => {
                let surface = self.attached()?;
                let osd = Arc::clone(&self.osd);
                Some(tokio::spawn(step_volume(surface, osd, sign, self.step)))
            }
        }
    }

    /// Re-injects the overlay into a freshly loaded document
    pub fn on_surface_event(&self, event: SurfaceEvent) -> Option<JoinHandle<()>> {
        match event {
            SurfaceEvent::Loaded => {
                let surface = self.attached()?;
                let osd = Arc::clone(&self.osd);
                Some(tokio::spawn(async move {
                    match osd.ensure(surface.as_ref()).await {
                        Ok(()) => debug!("OSD ensured after load"),
                        Err(e) => debug!("OSD ensure after load failed: {}", e),
                    }
                }))
            }
        }
    }

    fn attached(&self) -> Option<Arc<dyn TargetSurface>> {
        let surface = self.surface.current();
        if surface.is_none() {
            debug!("No surface attached, command ignored");
        }
        surface
    }

    /// Runs until `shutdown` fires or every dispatch sender is gone
    ///
    /// Surface work still in flight is awaited before returning.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting command loop");
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        let mut executed: u64 = 0;

        loop {
            let task = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received by executor");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        executed += 1;
                        debug!("Executing {:?}", command);
                        self.execute(command)
                    }
                    None => {
                        info!("All dispatch senders gone, stopping executor");
                        break;
                    }
                },
                Some(event) = self.lifecycle.recv() => self.on_surface_event(event),
            };

            if let Some(task) = task {
                in_flight.retain(|pending| !pending.is_finished());
                in_flight.push(task);
            }
        }

        for task in in_flight {
            if let Err(e) = task.await {
                warn!("Surface task ended abnormally: {}", e);
            }
        }
        info!("Command executor stopped after {} commands", executed);
    }
}

async fn press_key(surface: Arc<dyn TargetSurface>, key: KeyCode) {
    for kind in [KeyEventKind::KeyDown, KeyEventKind::KeyUp] {
        if let Err(e) = surface.send_key(KeyEvent { kind, key }).await {
            debug!("Key {} discarded: {}", key, e);
            return;
        }
    }
}

async fn step_volume(
    surface: Arc<dyn TargetSurface>,
    osd: Arc<OsdController>,
    sign: VolumeSign,
    step: f64,
) {
    let script = Script::AdjustVolume {
        delta: sign.delta(),
        step,
    };
    let value = match surface.evaluate(&script).await {
        Ok(value) => value,
        Err(e) => {
            debug!("Volume script discarded: {}", e);
            return;
        }
    };
    let report: VolumeReport = match serde_json::from_value(value) {
        Ok(report) => report,
        Err(e) => {
            warn!("Unexpected volume script result: {}", e);
            return;
        }
    };

    if !report.ok {
        debug!(
            "Volume unchanged: {}",
            report.reason.as_deref().unwrap_or("unknown")
        );
        return;
    }
    let Some(volume) = report.volume else {
        warn!("Volume script reported success without a volume");
        return;
    };
    debug!(
        "Volume now {:.2} ({} elements changed)",
        volume,
        report.changed.unwrap_or(0)
    );

    if let Err(e) = osd.ensure(surface.as_ref()).await {
        debug!("OSD ensure discarded: {}", e);
        return;
    }
    if let Err(e) = osd.show(surface.as_ref(), percent_for(volume)).await {
        debug!("OSD show discarded: {}", e);
    }
}

/// Host-facing end of a spawned executor
pub struct ExecutorHandle {
    lifecycle: mpsc::Sender<SurfaceEvent>,
    task: Option<JoinHandle<()>>,
}

impl ExecutorHandle {
    pub fn spawn(
        commands: DispatchReceiver,
        surface: SurfaceSlot,
        config: &AppConfig,
        close: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(8);
        let executor = CommandExecutor::create(commands, surface, config, lifecycle_rx, close);

        info!("Spawning command executor task");
        let task = tokio::spawn(async move {
            executor.start().run(shutdown).await;
        });

        Self {
            lifecycle: lifecycle_tx,
            task: Some(task),
        }
    }

    /// Tells the executor a document finished loading
    pub fn surface_loaded(&self) -> Result<(), ExecutorError> {
        self.lifecycle
            .try_send(SurfaceEvent::Loaded)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ExecutorError::Busy,
                mpsc::error::TrySendError::Closed(_) => ExecutorError::Stopped,
            })
    }

    /// Waits for the executor task to finish
    pub async fn join(&mut self) -> Result<(), ExecutorError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                error!("Executor task panicked: {}", e);
                ExecutorError::Task(e.to_string())
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{channel, DispatchSender};
    use crate::osd::OsdPhase;
    use crate::surface::document::{Document, MediaElement};

    struct Fixture {
        document: Arc<Document>,
        sender: DispatchSender,
        executor: CommandExecutor<Running>,
        close: CancellationToken,
        _lifecycle: mpsc::Sender<SurfaceEvent>,
    }

    fn fixture(media: Vec<MediaElement>) -> Fixture {
        let document = Arc::new(Document::new(media));
        let slot = SurfaceSlot::new();
        slot.attach(document.clone());

        let (sender, receiver) = channel(16);
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(4);
        let close = CancellationToken::new();
        let executor = CommandExecutor::create(
            receiver,
            slot,
            &AppConfig::default(),
            lifecycle_rx,
            close.clone(),
        )
        .start();

        Fixture {
            document,
            sender,
            executor,
            close,
            _lifecycle: lifecycle_tx,
        }
    }

    async fn finish(task: Option<JoinHandle<()>>) {
        task.expect("surface task").await.unwrap();
    }

    #[tokio::test]
    async fn test_key_command_sends_down_then_up() {
        let mut f = fixture(Vec::new());
        finish(f.executor.execute(Command::Key(KeyCode::Enter))).await;

        let kinds: Vec<_> = f.document.key_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![KeyEventKind::KeyDown, KeyEventKind::KeyUp]);
        assert!(f.document.key_events().iter().all(|e| e.key == KeyCode::Enter));
    }

    #[tokio::test]
    async fn test_disallowed_frames_never_reach_the_surface() {
        let f = fixture(vec![MediaElement::new(0.5)]);
        f.sender.send_key_action("F5");
        f.sender.send_key_action("alert");
        f.sender.send_volume_action(7);
        drop(f.sender);

        f.executor.run(CancellationToken::new()).await;

        assert!(f.document.key_events().is_empty());
        assert_eq!(f.document.media()[0].volume, 0.5);
        assert_eq!(f.document.osd().phase(), OsdPhase::Uninjected);
    }

    #[tokio::test]
    async fn test_volume_down_updates_media_and_osd() {
        let mut f = fixture(vec![MediaElement::new(0.4), MediaElement::new(0.9)]);
        finish(f.executor.execute(Command::Volume(VolumeSign::Down))).await;

        let media = f.document.media();
        assert!((media[0].volume - 0.35).abs() < 1e-9);
        assert_eq!(media[0].volume, media[1].volume);
        assert_eq!(f.document.osd().percent(), Some(35));
        assert_eq!(f.document.osd().phase(), OsdPhase::Visible);
        assert_eq!(f.document.osd().node_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_volume_up_at_full_stays_full() {
        let mut f = fixture(vec![MediaElement::new(1.0)]);
        for _ in 0..3 {
            finish(f.executor.execute(Command::Volume(VolumeSign::Up))).await;
        }
        assert_eq!(f.document.media()[0].volume, 1.0);
        assert_eq!(f.document.osd().percent(), Some(100));
        assert_eq!(f.document.osd().node_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_no_media_skips_osd() {
        let mut f = fixture(Vec::new());
        finish(f.executor.execute(Command::Volume(VolumeSign::Up))).await;
        assert_eq!(f.document.osd().phase(), OsdPhase::Uninjected);
    }

    #[tokio::test]
    async fn test_surface_errors_are_swallowed() {
        let mut f = fixture(vec![MediaElement::new(0.5)]);
        f.document.unload();

        finish(f.executor.execute(Command::Key(KeyCode::Space))).await;
        finish(f.executor.execute(Command::Volume(VolumeSign::Up))).await;

        assert!(f.document.key_events().is_empty());
        assert_eq!(f.document.media()[0].volume, 0.5);
    }

    #[tokio::test]
    async fn test_without_surface_commands_are_noops() {
        let mut f = fixture(Vec::new());
        f.executor.surface().detach();
        assert!(f.executor.execute(Command::Key(KeyCode::Up)).is_none());
        assert!(f.executor.execute(Command::Volume(VolumeSign::Up)).is_none());
    }

    #[tokio::test]
    async fn test_close_request_cancels_close_token() {
        let mut f = fixture(Vec::new());
        assert!(!f.close.is_cancelled());
        assert!(f.executor.execute(Command::Close).is_none());
        assert!(f.close.is_cancelled());
    }

    #[tokio::test]
    async fn test_load_event_reinjects_overlay() {
        let f = fixture(vec![MediaElement::default()]);
        finish(f.executor.on_surface_event(SurfaceEvent::Loaded)).await;
        assert_eq!(f.document.osd().phase(), OsdPhase::Hidden);

        f.document.navigate(vec![MediaElement::default()]);
        assert_eq!(f.document.osd().phase(), OsdPhase::Uninjected);

        finish(f.executor.on_surface_event(SurfaceEvent::Loaded)).await;
        assert_eq!(f.document.osd().phase(), OsdPhase::Hidden);
        assert_eq!(f.document.osd().node_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_handle_runs_until_shutdown() {
        let document = Arc::new(Document::new(vec![MediaElement::new(0.5)]));
        let slot = SurfaceSlot::new();
        slot.attach(document.clone());
        let (sender, receiver) = channel(16);
        let close = CancellationToken::new();
        let shutdown = CancellationToken::new();

        let mut handle = ExecutorHandle::spawn(
            receiver,
            slot,
            &AppConfig::default(),
            close.clone(),
            shutdown.clone(),
        );
        handle.surface_loaded().unwrap();
        sender.send_key_action("Escape");
        sender.request_close();

        close.cancelled().await;
        shutdown.cancel();
        handle.join().await.unwrap();

        assert_eq!(document.key_events().len(), 2);
        assert!(matches!(handle.surface_loaded(), Err(ExecutorError::Stopped)));
    }

    /// Surface whose `Up` presses take longer than any other key
    #[derive(Default)]
    struct SlowUpSurface {
        events: std::sync::Mutex<Vec<KeyEvent>>,
    }

    #[async_trait::async_trait]
    impl TargetSurface for SlowUpSurface {
        async fn send_key(&self, event: KeyEvent) -> Result<(), crate::surface::SurfaceError> {
            if event.key == KeyCode::Up {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            self.events.lock().unwrap().push(event);
            Ok(())
        }

        async fn evaluate(
            &self,
            _script: &Script,
        ) -> Result<serde_json::Value, crate::surface::SurfaceError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keys_reach_slow_surface_in_dispatch_order() {
        let mut f = fixture(Vec::new());
        let surface = Arc::new(SlowUpSurface::default());
        f.executor.surface().attach(surface.clone());

        let first = f.executor.execute(Command::Key(KeyCode::Up));
        let second = f.executor.execute(Command::Key(KeyCode::Down));
        finish(second).await;
        finish(first).await;

        let press = |kind, key| KeyEvent { kind, key };
        assert_eq!(
            *surface.events.lock().unwrap(),
            vec![
                press(KeyEventKind::KeyDown, KeyCode::Up),
                press(KeyEventKind::KeyUp, KeyCode::Up),
                press(KeyEventKind::KeyDown, KeyCode::Down),
                press(KeyEventKind::KeyUp, KeyCode::Down),
            ]
        );
    }
}
