//! Device snapshots and the per-tick device selector

use tracing::debug;

/// Button slots in the standard gamepad layout
pub mod layout {
    pub const SOUTH: usize = 0;
    pub const EAST: usize = 1;
    pub const WEST: usize = 2;
    pub const NORTH: usize = 3;
    pub const LEFT_BUMPER: usize = 4;
    pub const RIGHT_BUMPER: usize = 5;
    pub const LEFT_TRIGGER: usize = 6;
    pub const RIGHT_TRIGGER: usize = 7;
    pub const BACK: usize = 8;
    pub const START: usize = 9;
    pub const LEFT_STICK: usize = 10;
    pub const RIGHT_STICK: usize = 11;
    pub const DPAD_UP: usize = 12;
    pub const DPAD_DOWN: usize = 13;
    pub const DPAD_LEFT: usize = 14;
    pub const DPAD_RIGHT: usize = 15;
    pub const GUIDE: usize = 16;

    pub const BUTTON_COUNT: usize = 17;

    pub const LEFT_X: usize = 0;
    pub const LEFT_Y: usize = 1;
    pub const RIGHT_X: usize = 2;
    pub const RIGHT_Y: usize = 3;
}

/// Whether the backend could map the device onto the standard layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingQuality {
    Standard,
    Nonstandard,
}

/// One button read: digital press plus analog pressure in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ButtonState {
    pub pressed: bool,
    pub value: f32,
}

impl ButtonState {
    pub fn pressed() -> Self {
        Self {
            pressed: true,
            value: 1.0,
        }
    }

    pub fn analog(value: f32) -> Self {
        Self {
            pressed: false,
            value,
        }
    }

    pub fn is_active(&self, press_threshold: f32) -> bool {
        self.pressed || self.value >= press_threshold
    }
}

/// Immutable read of one device for one tick
///
/// Axes follow the browser gamepad convention: negative is up/left.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub id: usize,
    pub name: String,
    pub buttons: Vec<ButtonState>,
    pub axes: Vec<f32>,
    pub mapping: MappingQuality,
    pub connected: bool,
}

impl DeviceSnapshot {
    /// Connected device with all standard buttons released and four centered axes
    pub fn new(id: usize, name: impl Into<String>, mapping: MappingQuality) -> Self {
        Self {
            id,
            name: name.into(),
            buttons: vec![ButtonState::default(); layout::BUTTON_COUNT],
            axes: vec![0.0; 4],
            mapping,
            connected: true,
        }
    }

    pub fn with_button(mut self, index: usize, state: ButtonState) -> Self {
        if index >= self.buttons.len() {
            self.buttons.resize(index + 1, ButtonState::default());
        }
        self.buttons[index] = state;
        self
    }

    pub fn with_axis(mut self, index: usize, value: f32) -> Self {
        if index >= self.axes.len() {
            self.axes.resize(index + 1, 0.0);
        }
        self.axes[index] = value.clamp(-1.0, 1.0);
        self
    }

    pub fn with_axis_count(mut self, count: usize) -> Self {
        self.axes.resize(count, 0.0);
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn button(&self, index: usize) -> Option<ButtonState> {
        self.buttons.get(index).copied()
    }

    pub fn axis(&self, index: usize) -> Option<f32> {
        self.axes.get(index).copied()
    }
}

/// Per-tick poll of every reporting device
pub trait DeviceSource: Send {
    fn sample_devices(&mut self) -> Vec<DeviceSnapshot>;
}

/// Picks the authoritative device for this tick
///
/// Disconnected devices are ignored. The first standard-layout device wins,
/// otherwise the first connected one in enumeration order.
pub fn select_device(devices: &[DeviceSnapshot]) -> Option<&DeviceSnapshot> {
    let mut connected = devices.iter().filter(|d| d.connected);
    let first = connected.clone().next();
    let selected = connected
        .find(|d| d.mapping == MappingQuality::Standard)
        .or(first);

    if let Some(device) = selected {
        debug!("Selected device {} ({})", device.id, device.name);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_devices_selects_nothing() {
        assert!(select_device(&[]).is_none());
    }

    #[test]
    fn test_only_disconnected_devices_selects_nothing() {
        let devices = vec![
            DeviceSnapshot::new(0, "pad", MappingQuality::Standard).disconnected(),
            DeviceSnapshot::new(1, "pad", MappingQuality::Nonstandard).disconnected(),
        ];
        assert!(select_device(&devices).is_none());
    }

    #[test]
    fn test_standard_device_wins_regardless_of_order() {
        let nonstandard = DeviceSnapshot::new(0, "wheel", MappingQuality::Nonstandard);
        let standard = DeviceSnapshot::new(1, "xbox", MappingQuality::Standard);

        let devices = vec![nonstandard.clone(), standard.clone()];
        assert_eq!(select_device(&devices).map(|d| d.id), Some(1));

        let devices = vec![standard, nonstandard];
        assert_eq!(select_device(&devices).map(|d| d.id), Some(1));
    }

    #[test]
    fn test_falls_back_to_first_connected() {
        let devices = vec![
            DeviceSnapshot::new(0, "gone", MappingQuality::Standard).disconnected(),
            DeviceSnapshot::new(1, "joystick", MappingQuality::Nonstandard),
            DeviceSnapshot::new(2, "pedals", MappingQuality::Nonstandard),
        ];
        assert_eq!(select_device(&devices).map(|d| d.id), Some(1));
    }

    #[test]
    fn test_two_standard_devices_first_enumerated_wins() {
        let devices = vec![
            DeviceSnapshot::new(4, "first", MappingQuality::Standard),
            DeviceSnapshot::new(2, "second", MappingQuality::Standard),
        ];
        assert_eq!(select_device(&devices).map(|d| d.id), Some(4));
    }

    #[test]
    fn test_button_and_axis_builders() {
        let snapshot = DeviceSnapshot::new(0, "pad", MappingQuality::Standard)
            .with_button(layout::LEFT_TRIGGER, ButtonState::analog(0.7))
            .with_axis(layout::LEFT_X, -3.0)
            .with_axis_count(3);

        assert_eq!(snapshot.axis(layout::LEFT_X), Some(-1.0));
        assert_eq!(snapshot.axis(layout::RIGHT_Y), None);
        assert!(snapshot
            .button(layout::LEFT_TRIGGER)
            .is_some_and(|b| b.is_active(0.5)));
        assert!(!ButtonState::analog(0.3).is_active(0.5));
        assert!(ButtonState::pressed().is_active(0.5));
        assert!(snapshot.button(40).is_none());
    }
}
