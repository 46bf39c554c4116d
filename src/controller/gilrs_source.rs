//! gilrs-backed [`DeviceSource`]
//!
//! gilrs names buttons semantically; snapshots expose them in the standard
//! slot order so the mapping table can stay index based.

use super::device::{layout, ButtonState, DeviceSnapshot, DeviceSource, MappingQuality};
use super::sampler::SamplerError;
use gilrs::{Axis, Button, Event, EventType, Gamepad, Gilrs, MappingSource};
use tracing::{debug, error, info, warn};

/// gilrs buttons in standard slot order
const STANDARD_BUTTONS: [Button; layout::BUTTON_COUNT] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Stick axes in standard slot order; `true` marks axes gilrs reports up-positive
const STANDARD_AXES: [(Axis, bool); 4] = [
    (Axis::LeftStickX, false),
    (Axis::LeftStickY, true),
    (Axis::RightStickX, false),
    (Axis::RightStickY, true),
];

pub struct GilrsSource {
    gilrs: Gilrs,
}

impl GilrsSource {
    pub fn new() -> Result<Self, SamplerError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            SamplerError::Backend(e.to_string())
        })?;

        let count = gilrs.gamepads().count();
        if count == 0 {
            warn!("No gamepad connected, continuing in idle mode");
        }
        for (id, gamepad) in gilrs.gamepads() {
            info!(
                "  ID: {}, Name: {}, Mapping: {:?}",
                id,
                gamepad.name(),
                gamepad.mapping_source()
            );
        }
        Ok(Self { gilrs })
    }

    /// Applies queued backend events to gilrs' cached gamepad state
    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!("Gamepad {} connected", id);
                }
                EventType::Disconnected => {
                    warn!("Gamepad {} disconnected", id);
                }
                _ => {}
            }
        }
    }
}

impl DeviceSource for GilrsSource {
    fn sample_devices(&mut self) -> Vec<DeviceSnapshot> {
        self.pump_events();
        self.gilrs
            .gamepads()
            .map(|(id, gamepad)| snapshot(usize::from(id), &gamepad))
            .collect()
    }
}

fn snapshot(id: usize, gamepad: &Gamepad<'_>) -> DeviceSnapshot {
    let mapping = match gamepad.mapping_source() {
        MappingSource::None => MappingQuality::Nonstandard,
        _ => MappingQuality::Standard,
    };

    let buttons = STANDARD_BUTTONS
        .iter()
        .map(|&button| match gamepad.button_data(button) {
            Some(data) => ButtonState {
                pressed: data.is_pressed(),
                value: data.value().clamp(0.0, 1.0),
            },
            None => ButtonState::default(),
        })
        .collect();

    // presence comes from the device's axis codes; values read 0.0 until the
    // axis first reports
    let readings = STANDARD_AXES.map(|(axis, flip)| {
        gamepad.axis_code(axis).map(|_| {
            let value = gamepad.value(axis);
            if flip {
                -value
            } else {
                value
            }
        })
    });
    let axes = standard_axes(readings);

    debug!("Sampled {} ({:?})", gamepad.name(), mapping);
    DeviceSnapshot {
        id,
        name: gamepad.name().to_string(),
        buttons,
        axes,
        mapping,
        connected: gamepad.is_connected(),
    }
}

/// Lays out per-slot readings, `None` marking an axis the device lacks
///
/// The vector ends at the last present slot, so a device without a right
/// stick Y reports three axes, which is what the volume fallback relies on.
/// Missing slots before that read centered.
fn standard_axes(readings: [Option<f32>; 4]) -> Vec<f32> {
    let len = readings.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
    readings[..len]
        .iter()
        .map(|reading| reading.unwrap_or(0.0).clamp(-1.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_axes_are_reported() {
        let axes = standard_axes([Some(0.0); 4]);
        assert_eq!(axes, vec![0.0; 4]);
    }

    #[test]
    fn test_missing_right_stick_y_shortens_to_three() {
        let axes = standard_axes([Some(0.0), Some(0.0), Some(0.7), None]);
        assert_eq!(axes, vec![0.0, 0.0, 0.7]);
    }

    #[test]
    fn test_missing_leading_axis_keeps_later_slots() {
        let axes = standard_axes([None, Some(-0.2), Some(0.0), Some(0.5)]);
        assert_eq!(axes, vec![0.0, -0.2, 0.0, 0.5]);
    }

    #[test]
    fn test_no_axes_and_clamping() {
        assert!(standard_axes([None; 4]).is_empty());
        assert_eq!(standard_axes([Some(1.5), Some(-3.0), None, None]), vec![1.0, -1.0]);
    }
}
