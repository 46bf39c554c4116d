//! Controller subsystem: device polling and the per-frame sampling loop
//!
//! ```text
//! FramePacer ──tick──► InputSampler ──► DeviceSource::sample_devices()
//!                          │                 (gilrs)
//!                          ├──► select_device ──► MappingTable
//!                          └──► DispatchSender
//! ```

pub mod device;
pub mod frame;
pub mod gilrs_source;
pub mod sampler;

pub use device::{select_device, DeviceSnapshot, DeviceSource, MappingQuality};
pub use frame::{FramePacer, FrameTick};
pub use gilrs_source::GilrsSource;
pub use sampler::{InputSampler, SamplerError, SamplerHandle};
