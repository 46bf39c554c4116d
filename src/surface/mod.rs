//! Target surface: the hosted playback page
//!
//! The surface accepts synthetic key events and script evaluation. Scripts
//! are typed values; [`Script::source`] renders them to JavaScript for hosts
//! backed by a real browser engine, while [`document::Document`] interprets
//! them directly.

pub mod document;

use crate::dispatch::KeyCode;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Surface not loaded")]
    NotLoaded,

    #[error("Script context destroyed")]
    ContextDestroyed,

    #[error("Script failed: {0}")]
    Script(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: KeyCode,
}

/// Marker global set by the overlay script, readable only inside the page
pub const OSD_MARKER: &str = "__couchpadOsd";
const OSD_ELEMENT_ID: &str = "couchpad-osd";
const OSD_STYLE_ID: &str = "couchpad-osd-style";

const OSD_STYLE: &str = "\
#couchpad-osd{position:fixed;right:24px;top:50%;transform:translateY(-50%);\
z-index:2147483647;pointer-events:none;opacity:0;transition:opacity 150ms ease;\
font-family:system-ui,sans-serif}\
#couchpad-osd .panel{display:flex;flex-direction:column;align-items:center;gap:8px;\
padding:10px;border-radius:16px;background:rgba(0,0,0,0.55);\
border:1px solid rgba(255,255,255,0.15)}\
#couchpad-osd .pct{color:#fff;font-weight:800;font-size:14px;min-width:52px;text-align:center}\
#couchpad-osd .bar{position:relative;width:14px;height:160px;overflow:hidden;\
border-radius:999px;background:rgba(255,255,255,0.12)}\
#couchpad-osd .fill{position:absolute;left:0;bottom:0;width:100%;height:0%;\
border-radius:999px;background:rgba(255,255,255,0.9);transition:height 90ms linear}\
#couchpad-osd .label{color:#fff;font-size:10px;letter-spacing:1.4px;opacity:0.65}";

const OSD_MARKUP: &str = "<div class=\"panel\"><div class=\"pct\">--%</div>\
<div class=\"bar\"><div class=\"fill\"></div></div><div class=\"label\">VOL</div></div>";

/// Script evaluated inside the surface's own execution context
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Steps every media element to `clamp01(first.volume + delta * step)`
    ///
    /// Evaluates to `{ok, volume, changed}` or `{ok: false, reason}`.
    AdjustVolume { delta: i64, step: f64 },
    /// Injects the overlay once per document
    EnsureOsd { dwell_ms: u64 },
    /// Updates the overlay if it has been injected
    ShowOsd { percent: i64 },
}

impl Script {
    pub fn source(&self) -> String {
        match self {
            Script::AdjustVolume { delta, step } => format!(
                "(() => {{\
                 const media = Array.from(document.querySelectorAll('video'));\
                 if (media.length === 0) return {{ ok: false, reason: 'no_media' }};\
                 for (const m of media) m.muted = false;\
                 const current = media[0].volume ?? 1;\
                 const next = Math.max(0, Math.min(1, current + ({delta}) * {step}));\
                 let changed = 0;\
                 for (const m of media) {{\
                 if (m.volume !== next) {{ m.volume = next; changed++; }}\
                 }}\
                 return {{ ok: true, volume: next, changed }};\
                 }})()"
            ),
            Script::EnsureOsd { dwell_ms } => format!(
                "(() => {{\
                 if (window.{marker}) return true;\
                 const style = document.createElement('style');\
                 style.id = '{style_id}';\
                 style.textContent = '{style}';\
                 document.documentElement.appendChild(style);\
                 const root = document.createElement('div');\
                 root.id = '{element_id}';\
                 root.innerHTML = '{markup}';\
                 document.documentElement.appendChild(root);\
                 window.{marker} = {{\
                 timer: null,\
                 show(pct) {{\
                 const el = document.getElementById('{element_id}');\
                 if (!el) return;\
                 const clamped = Math.max(0, Math.min(100, pct));\
                 el.querySelector('.pct').textContent = clamped + '%';\
                 el.querySelector('.fill').style.height = clamped + '%';\
                 el.style.opacity = '1';\
                 clearTimeout(this.timer);\
                 this.timer = setTimeout(() => {{ el.style.opacity = '0'; }}, {dwell_ms});\
                 }}\
                 }};\
                 return true;\
                 }})()",
                marker = OSD_MARKER,
                style_id = OSD_STYLE_ID,
                element_id = OSD_ELEMENT_ID,
                style = OSD_STYLE,
                markup = OSD_MARKUP,
            ),
            Script::ShowOsd { percent } => format!(
                "(() => {{ const osd = window.{marker}; if (osd) osd.show({percent}); }})()",
                marker = OSD_MARKER,
            ),
        }
    }
}

/// The hosted page, as seen from the privileged side
#[async_trait]
pub trait TargetSurface: Send + Sync {
    async fn send_key(&self, event: KeyEvent) -> Result<(), SurfaceError>;

    async fn evaluate(&self, script: &Script) -> Result<serde_json::Value, SurfaceError>;
}

/// Explicit handle to the current surface, empty while none is attached
///
/// Clones share the slot. Readers take a snapshot and never observe a
/// half-swapped surface.
#[derive(Clone)]
pub struct SurfaceSlot {
    current: Arc<watch::Sender<Option<Arc<dyn TargetSurface>>>>,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            current: Arc::new(tx),
        }
    }

    pub fn attach(&self, surface: Arc<dyn TargetSurface>) {
        info!("Surface attached");
        self.current.send_replace(Some(surface));
    }

    pub fn detach(&self) {
        if self.current.send_replace(None).is_some() {
            info!("Surface detached");
        }
    }

    pub fn current(&self) -> Option<Arc<dyn TargetSurface>> {
        self.current.borrow().clone()
    }
}

impl Default for SurfaceSlot {
    fn default() -> Self {
        Self::new()
    }
}
