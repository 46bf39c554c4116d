//! Volume on-screen display
//!
//! Two halves that never share state:
//!
//! - [`OsdController`] runs on the privileged side and only evaluates
//!   [`Script::EnsureOsd`] / [`Script::ShowOsd`] against the surface.
//! - [`OsdOverlay`] is the document-side state machine those scripts drive,
//!   used by surfaces that interpret scripts in-process.
//!
//! ```text
//! Uninjected ──ensure──► Injected{Hidden} ──show──► Injected{Visible}
//!     ▲                        ▲                        │
//!     └──── reset (navigate) ──┴──────── fade timer ────┘
//! ```

use crate::surface::{Script, SurfaceError, TargetSurface};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Percentage shown for a volume in [0, 1]
pub fn percent_for(volume: f64) -> i64 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as i64
}

pub struct OsdController {
    dwell: Duration,
}

impl OsdController {
    pub fn new(dwell: Duration) -> Self {
        Self { dwell }
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Injects the overlay unless this document already has it
    pub async fn ensure(&self, surface: &dyn TargetSurface) -> Result<(), SurfaceError> {
        let script = Script::EnsureOsd {
            dwell_ms: self.dwell.as_millis() as u64,
        };
        surface.evaluate(&script).await?;
        Ok(())
    }

    pub async fn show(
        &self,
        surface: &dyn TargetSurface,
        percent: i64,
    ) -> Result<(), SurfaceError> {
        debug!("Showing volume OSD at {}%", percent);
        surface.evaluate(&Script::ShowOsd { percent }).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsdPhase {
    Uninjected,
    Hidden,
    Visible,
}

#[derive(Debug)]
struct OverlayState {
    phase: OsdPhase,
    percent: Option<i64>,
    dwell: Duration,
    fade: Option<JoinHandle<()>>,
    // bumped on every show and reset; a fade only applies to its own generation
    generation: u64,
    overlay_nodes: usize,
    style_nodes: usize,
    fades: u64,
}

/// Document-side overlay, one per document lifetime
#[derive(Debug, Clone)]
pub struct OsdOverlay {
    state: Arc<Mutex<OverlayState>>,
}

impl OsdOverlay {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OverlayState {
                phase: OsdPhase::Uninjected,
                percent: None,
                dwell: Duration::ZERO,
                fade: None,
                generation: 0,
                overlay_nodes: 0,
                style_nodes: 0,
                fades: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true when this call injected the overlay
    pub fn ensure(&self, dwell: Duration) -> bool {
        let mut state = self.lock();
        if state.phase != OsdPhase::Uninjected {
            return false;
        }
        state.style_nodes += 1;
        state.overlay_nodes += 1;
        state.dwell = dwell;
        state.phase = OsdPhase::Hidden;
        info!("Volume OSD injected");
        true
    }

    /// Displays `percent` and re-arms the single fade timer
    ///
    /// Must be called from within a tokio runtime. No-op before injection.
    pub fn show(&self, percent: i64) {
        let mut state = self.lock();
        if state.phase == OsdPhase::Uninjected {
            debug!("OSD show({}) before injection ignored", percent);
            return;
        }

        state.percent = Some(percent.clamp(0, 100));
        state.phase = OsdPhase::Visible;
        state.generation += 1;
        if let Some(pending) = state.fade.take() {
            pending.abort();
        }

        let generation = state.generation;
        let deadline = tokio::time::Instant::now() + state.dwell;
        let shared = Arc::clone(&self.state);
        state.fade = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation == generation && state.phase == OsdPhase::Visible {
                state.phase = OsdPhase::Hidden;
                state.fade = None;
                state.fades += 1;
                debug!("Volume OSD faded out");
            }
        }));
    }

    /// Drops all injected state, as a document reload does
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.fade.take() {
            pending.abort();
        }
        state.generation += 1;
        state.phase = OsdPhase::Uninjected;
        state.percent = None;
        state.overlay_nodes = 0;
        state.style_nodes = 0;
    }

    pub fn phase(&self) -> OsdPhase {
        self.lock().phase
    }

    pub fn percent(&self) -> Option<i64> {
        self.lock().percent
    }

    /// Overlay and style nodes present in the document
    pub fn node_counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.overlay_nodes, state.style_nodes)
    }

    pub fn fade_count(&self) -> u64 {
        self.lock().fades
    }

    pub fn has_pending_fade(&self) -> bool {
        self.lock().fade.is_some()
    }
}

impl Default for OsdOverlay {
    fn default() -> Self {
        Self::new()
    }
}
