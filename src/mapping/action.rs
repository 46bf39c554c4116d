//! Semantic actions produced by the mapping table

use crate::dispatch::KeyCode;
use std::fmt;

/// Discrete navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackDirection {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekDirection {
    Backward,
    Forward,
}

/// Sign of a single volume step
///
/// The wire form is the integer delta `+1` / `-1`; nothing else converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeSign {
    Up,
    Down,
}

impl VolumeSign {
    pub fn delta(self) -> i64 {
        match self {
            VolumeSign::Up => 1,
            VolumeSign::Down => -1,
        }
    }

    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta {
            1 => Some(VolumeSign::Up),
            -1 => Some(VolumeSign::Down),
            _ => None,
        }
    }
}

/// A semantic command derived from raw input, ready for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NavigateDiscrete { direction: Direction },
    Confirm,
    Cancel,
    TogglePlayback,
    Search,
    SkipTrack { direction: TrackDirection },
    Seek { direction: SeekDirection },
    VolumeDelta { sign: VolumeSign },
    CloseApp,
}

impl Action {
    /// Key identifier injected into the surface for key-style actions
    ///
    /// `VolumeDelta` and `CloseApp` travel as their own message kinds and
    /// return `None`.
    pub fn key(&self) -> Option<KeyCode> {
        let key = match self {
            Action::NavigateDiscrete { direction } => match direction {
                Direction::Up => KeyCode::Up,
                Direction::Down => KeyCode::Down,
                Direction::Left => KeyCode::Left,
                Direction::Right => KeyCode::Right,
            },
            Action::Confirm => KeyCode::Enter,
            Action::Cancel => KeyCode::Escape,
            Action::TogglePlayback => KeyCode::Space,
            Action::Search => KeyCode::S,
            Action::SkipTrack { direction } => match direction {
                TrackDirection::Previous => KeyCode::MediaPreviousTrack,
                TrackDirection::Next => KeyCode::MediaNextTrack,
            },
            Action::Seek { direction } => match direction {
                SeekDirection::Backward => KeyCode::J,
                SeekDirection::Forward => KeyCode::L,
            },
            Action::VolumeDelta { .. } | Action::CloseApp => return None,
        };
        Some(key)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NavigateDiscrete { direction } => write!(f, "Navigate({:?})", direction),
            Action::Confirm => write!(f, "Confirm"),
            Action::Cancel => write!(f, "Cancel"),
            Action::TogglePlayback => write!(f, "TogglePlayback"),
            Action::Search => write!(f, "Search"),
            Action::SkipTrack { direction } => write!(f, "SkipTrack({:?})", direction),
            Action::Seek { direction } => write!(f, "Seek({:?})", direction),
            Action::VolumeDelta { sign } => write!(f, "VolumeDelta({:+})", sign.delta()),
            Action::CloseApp => write!(f, "CloseApp"),
        }
    }
}
