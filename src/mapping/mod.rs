//! Gamepad state to semantic actions
//!
//! ```text
//! DeviceSnapshot ──► MappingTable (ordered rules) ──► ThrottleRegistry ──► Action
//! ```

pub mod action;
pub mod rules;
pub mod throttle;

pub use action::{Action, Direction, SeekDirection, TrackDirection, VolumeSign};
pub use rules::{MappingRule, MappingTable, Trigger};
pub use throttle::ThrottleRegistry;
