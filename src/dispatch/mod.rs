//! One-way action channel across the privilege boundary
//!
//! The sampling side posts plain JSON frames; nothing is shared by reference.
//! The executor side decodes and re-validates every frame on its own, so a
//! buggy or compromised sender can only ever cause a dropped message.
//!
//! ```text
//! InputSampler ──► DispatchSender ─[JSON frame]─► DispatchReceiver ──► Command
//!                  (try_send, lossy)              (decode + allow-list)
//! ```

use crate::mapping::action::{Action, VolumeSign};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Key identifier not allowed: {0}")]
    KeyNotAllowed(String),

    #[error("Volume delta must be +1 or -1, got {0}")]
    InvalidDelta(i64),
}

/// Allow-listed key identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Space,
    J,
    L,
    S,
    MediaPreviousTrack,
    MediaNextTrack,
}

impl KeyCode {
    pub const ALL: [KeyCode; 12] = [
        KeyCode::Up,
        KeyCode::Down,
        KeyCode::Left,
        KeyCode::Right,
        KeyCode::Enter,
        KeyCode::Escape,
        KeyCode::Space,
        KeyCode::J,
        KeyCode::L,
        KeyCode::S,
        KeyCode::MediaPreviousTrack,
        KeyCode::MediaNextTrack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KeyCode::Up => "Up",
            KeyCode::Down => "Down",
            KeyCode::Left => "Left",
            KeyCode::Right => "Right",
            KeyCode::Enter => "Enter",
            KeyCode::Escape => "Escape",
            KeyCode::Space => "Space",
            KeyCode::J => "J",
            KeyCode::L => "L",
            KeyCode::S => "S",
            KeyCode::MediaPreviousTrack => "MediaPreviousTrack",
            KeyCode::MediaNextTrack => "MediaNextTrack",
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCode {
    type Err = DispatchError;

    fn from_str(identifier: &str) -> Result<Self, Self::Err> {
        KeyCode::ALL
            .into_iter()
            .find(|key| key.as_str() == identifier)
            .ok_or_else(|| DispatchError::KeyNotAllowed(identifier.to_string()))
    }
}

/// Frame as it travels over the channel, not yet trusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum PadMessage {
    #[serde(rename = "pad:key")]
    Key(String),
    #[serde(rename = "pad:volume")]
    Volume(i64),
    #[serde(rename = "app:close")]
    Close,
}

impl PadMessage {
    pub fn encode(&self) -> Result<String, DispatchError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self, DispatchError> {
        Ok(serde_json::from_str(frame)?)
    }

    pub fn validate(self) -> Result<Command, DispatchError> {
        match self {
            PadMessage::Key(identifier) => Ok(Command::Key(identifier.parse()?)),
            PadMessage::Volume(delta) => VolumeSign::from_delta(delta)
                .map(Command::Volume)
                .ok_or(DispatchError::InvalidDelta(delta)),
            PadMessage::Close => Ok(Command::Close),
        }
    }
}

/// A validated message, safe to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Key(KeyCode),
    Volume(VolumeSign),
    Close,
}

pub fn channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    debug!("Created dispatch channel with capacity {}", capacity);
    (DispatchSender { tx }, DispatchReceiver { rx })
}

/// Sampling-side end; every send is fire-and-forget
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<String>,
}

impl DispatchSender {
    pub fn send_key_action(&self, identifier: &str) {
        self.post(PadMessage::Key(identifier.to_string()));
    }

    pub fn send_volume_action(&self, delta: i64) {
        self.post(PadMessage::Volume(delta));
    }

    pub fn request_close(&self) {
        self.post(PadMessage::Close);
    }

    pub fn send_action(&self, action: Action) {
        match action {
            Action::VolumeDelta { sign } => self.send_volume_action(sign.delta()),
            Action::CloseApp => self.request_close(),
            other => match other.key() {
                Some(key) => self.send_key_action(key.as_str()),
                None => warn!("Action {} has no key binding", other),
            },
        }
    }

    /// Drops the frame when the channel is full or the executor is gone
    pub fn send_frame(&self, frame: String) {
        match self.tx.try_send(frame) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(frame)) => {
                debug!("Dispatch channel full, dropping {}", frame);
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                debug!("Executor unavailable, dropping {}", frame);
            }
        }
    }

    fn post(&self, message: PadMessage) {
        match message.encode() {
            Ok(frame) => self.send_frame(frame),
            Err(e) => warn!("Failed to encode {:?}: {}", message, e),
        }
    }
}

/// Executor-side end
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<String>,
}

impl DispatchReceiver {
    /// Next valid command; invalid frames are skipped
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Command> {
        loop {
            let frame = self.rx.recv().await?;
            match PadMessage::decode(&frame).and_then(PadMessage::validate) {
                Ok(command) => return Some(command),
                Err(e) => debug!("Dropped frame {}: {}", frame, e),
            }
        }
    }
}
