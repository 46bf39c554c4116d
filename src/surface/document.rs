//! In-process reference surface
//!
//! Models one hosted page: its media elements, the key events it received
//! and the volume overlay. Scripts are interpreted directly instead of being
//! run by a JavaScript engine. Used for preview runs and tests.

use super::{KeyEvent, Script, SurfaceError, TargetSurface};
use crate::dispatch::DispatchSender;
use crate::executor::volume::next_volume;
use crate::mapping::action::VolumeSign;
use crate::osd::OsdOverlay;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaElement {
    pub volume: f64,
    pub muted: bool,
}

impl MediaElement {
    pub fn new(volume: f64) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            muted: false,
        }
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }
}

impl Default for MediaElement {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[derive(Debug)]
struct Page {
    loaded: bool,
    media: Vec<MediaElement>,
    key_events: Vec<KeyEvent>,
    loads: u64,
}

pub struct Document {
    page: Mutex<Page>,
    osd: OsdOverlay,
    // page-side end of the dispatch channel, used for teardown requests
    host: Mutex<Option<DispatchSender>>,
}

impl Document {
    /// A loaded page holding `media`
    pub fn new(media: Vec<MediaElement>) -> Self {
        Self {
            page: Mutex::new(Page {
                loaded: true,
                media,
                key_events: Vec::new(),
                loads: 1,
            }),
            osd: OsdOverlay::new(),
            host: Mutex::new(None),
        }
    }

    /// Connects the page to the dispatch channel
    pub fn bind(&self, sender: DispatchSender) {
        *self.host.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// The page asks its host to close, as `window.close()` would
    ///
    /// Returns false when the page is not bound to a channel.
    pub fn close(&self) -> bool {
        let host = self.host.lock().unwrap_or_else(PoisonError::into_inner);
        match host.as_ref() {
            Some(sender) => {
                info!("Document requested close");
                sender.request_close();
                true
            }
            None => {
                debug!("Close requested on unbound document");
                false
            }
        }
    }

    fn page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begins a navigation; the page rejects scripts until [`finish_load`](Self::finish_load)
    pub fn unload(&self) {
        self.page().loaded = false;
        self.osd.reset();
        debug!("Document unloaded");
    }

    /// Completes a navigation to a page holding `media`
    pub fn finish_load(&self, media: Vec<MediaElement>) {
        let mut page = self.page();
        page.loaded = true;
        page.media = media;
        page.loads += 1;
        info!("Document loaded ({} media elements)", page.media.len());
    }

    /// Unload and load in one step
    pub fn navigate(&self, media: Vec<MediaElement>) {
        self.unload();
        self.finish_load(media);
    }

    pub fn media(&self) -> Vec<MediaElement> {
        self.page().media.clone()
    }

    pub fn key_events(&self) -> Vec<KeyEvent> {
        self.page().key_events.clone()
    }

    pub fn load_count(&self) -> u64 {
        self.page().loads
    }

    pub fn osd(&self) -> &OsdOverlay {
        &self.osd
    }

    fn adjust_volume(&self, delta: i64, step: f64) -> Value {
        let Some(sign) = VolumeSign::from_delta(delta) else {
            return json!({ "ok": false, "reason": "bad_delta" });
        };
        let mut page = self.page();
        let Some(first) = page.media.first() else {
            return json!({ "ok": false, "reason": "no_media" });
        };

        let next = next_volume(first.volume, sign, step);
        let mut changed = 0;
        for element in page.media.iter_mut() {
            element.muted = false;
            if element.volume != next {
                element.volume = next;
                changed += 1;
            }
        }
        info!("Volume set to {:.2} on {} media elements", next, changed);
        json!({ "ok": true, "volume": next, "changed": changed })
    }
}

#[async_trait]
impl TargetSurface for Document {
    async fn send_key(&self, event: KeyEvent) -> Result<(), SurfaceError> {
        let mut page = self.page();
        if !page.loaded {
            return Err(SurfaceError::NotLoaded);
        }
        info!("Key {:?} {}", event.kind, event.key);
        page.key_events.push(event);
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> Result<Value, SurfaceError> {
        if !self.page().loaded {
            return Err(SurfaceError::NotLoaded);
        }
        let result = match *script {
            Script::AdjustVolume { delta, step } => self.adjust_volume(delta, step),
            Script::EnsureOsd { dwell_ms } => {
                self.osd.ensure(Duration::from_millis(dwell_ms));
                Value::Bool(true)
            }
            Script::ShowOsd { percent } => {
                self.osd.show(percent);
                Value::Null
            }
        };
        Ok(result)
    }
}
