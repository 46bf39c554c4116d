//! Ordered gesture table: snapshot state → throttled actions
//!
//! Rules are evaluated in table order every tick and every rule that fires is
//! emitted. Throttle classes name the gesture, so the d-pad and the left stick
//! share one window per direction.

use crate::config::AppConfig;
use crate::controller::device::{layout, DeviceSnapshot};
use crate::mapping::action::{Action, Direction, SeekDirection, TrackDirection, VolumeSign};
use crate::mapping::throttle::ThrottleRegistry;
use std::time::{Duration, Instant};
use tracing::debug;

/// Axis half that activates a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisHalf {
    Negative,
    Positive,
}

/// What makes a rule active on a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Button(usize),
    /// `fallback` is read only when the device does not report `primary`
    Axis {
        primary: usize,
        fallback: Option<usize>,
        half: AxisHalf,
    },
}

impl Trigger {
    fn axis(index: usize, half: AxisHalf) -> Self {
        Trigger::Axis {
            primary: index,
            fallback: None,
            half,
        }
    }

    pub fn is_active(
        &self,
        snapshot: &DeviceSnapshot,
        deadzone: f32,
        press_threshold: f32,
    ) -> bool {
        match *self {
            Trigger::Button(index) => snapshot
                .button(index)
                .is_some_and(|button| button.is_active(press_threshold)),
            Trigger::Axis {
                primary,
                fallback,
                half,
            } => {
                let value = snapshot
                    .axis(primary)
                    .or_else(|| fallback.and_then(|index| snapshot.axis(index)))
                    .unwrap_or(0.0);
                if value.abs() <= deadzone {
                    return false;
                }
                match half {
                    AxisHalf::Negative => value < 0.0,
                    AxisHalf::Positive => value > 0.0,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub class: &'static str,
    pub trigger: Trigger,
    pub action: Action,
    pub window: Duration,
}

impl MappingRule {
    fn new(class: &'static str, trigger: Trigger, action: Action, window: Duration) -> Self {
        Self {
            class,
            trigger,
            action,
            window,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
    deadzone: f32,
    press_threshold: f32,
}

impl MappingTable {
    pub fn new(rules: Vec<MappingRule>, deadzone: f32, press_threshold: f32) -> Self {
        Self {
            rules,
            deadzone,
            press_threshold,
        }
    }

    /// The remote-control layout for a standard gamepad
    pub fn standard(config: &AppConfig) -> Self {
        let throttle = &config.throttle;
        let sampling = &config.sampling;
        let nav = throttle.navigation();
        let button = throttle.button();
        let media = throttle.media();
        let seek = throttle.seek();
        let volume = throttle.volume();

        let navigate = |direction| Action::NavigateDiscrete { direction };
        let skip = |direction| Action::SkipTrack { direction };
        let seek_to = |direction| Action::Seek { direction };
        let change = |sign| Action::VolumeDelta { sign };
        let press = |class, index, action, window| {
            MappingRule::new(class, Trigger::Button(index), action, window)
        };
        let stick = |class, index, half, direction| {
            MappingRule::new(class, Trigger::axis(index, half), navigate(direction), nav)
        };
        let volume_axis = |half| Trigger::Axis {
            primary: sampling.volume_axis,
            fallback: sampling.volume_axis_fallback,
            half,
        };

        let rules = vec![
            // d-pad
            press("nav_up", layout::DPAD_UP, navigate(Direction::Up), nav),
            press("nav_down", layout::DPAD_DOWN, navigate(Direction::Down), nav),
            press("nav_left", layout::DPAD_LEFT, navigate(Direction::Left), nav),
            press("nav_right", layout::DPAD_RIGHT, navigate(Direction::Right), nav),
            // left stick
            stick("nav_left", layout::LEFT_X, AxisHalf::Negative, Direction::Left),
            stick("nav_right", layout::LEFT_X, AxisHalf::Positive, Direction::Right),
            stick("nav_up", layout::LEFT_Y, AxisHalf::Negative, Direction::Up),
            stick("nav_down", layout::LEFT_Y, AxisHalf::Positive, Direction::Down),
            // face buttons
            press("confirm", layout::SOUTH, Action::Confirm, button),
            press("cancel", layout::EAST, Action::Cancel, button),
            press("cancel", layout::BACK, Action::Cancel, button),
            press("playback", layout::START, Action::TogglePlayback, button),
            press("playback", layout::WEST, Action::TogglePlayback, button),
            press("search", layout::NORTH, Action::Search, button),
            // bumpers
            press("skip_prev", layout::LEFT_BUMPER, skip(TrackDirection::Previous), media),
            press("skip_next", layout::RIGHT_BUMPER, skip(TrackDirection::Next), media),
            // triggers, repeat while held
            press("seek_back", layout::LEFT_TRIGGER, seek_to(SeekDirection::Backward), seek),
            press("seek_forward", layout::RIGHT_TRIGGER, seek_to(SeekDirection::Forward), seek),
            // right stick vertical, up raises volume
            MappingRule::new(
                "volume_up",
                volume_axis(AxisHalf::Negative),
                change(VolumeSign::Up),
                volume,
            ),
            MappingRule::new(
                "volume_down",
                volume_axis(AxisHalf::Positive),
                change(VolumeSign::Down),
                volume,
            ),
        ];

        Self::new(rules, sampling.deadzone, sampling.press_threshold)
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Actions that fire on this snapshot and pass their throttle window
    ///
    /// The throttle is consulted only for active rules, so an idle gesture
    /// never consumes its window.
    pub fn evaluate(
        &self,
        snapshot: &DeviceSnapshot,
        registry: &mut ThrottleRegistry,
        now: Instant,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        for rule in &self.rules {
            if !rule
                .trigger
                .is_active(snapshot, self.deadzone, self.press_threshold)
            {
                continue;
            }
            if registry.pulse_at(rule.class, rule.window, now) {
                debug!("Rule {} fired: {}", rule.class, rule.action);
                actions.push(rule.action);
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device::{ButtonState, MappingQuality};

    fn pad() -> DeviceSnapshot {
        DeviceSnapshot::new(0, "pad", MappingQuality::Standard)
    }

    fn evaluate_once(snapshot: &DeviceSnapshot) -> Vec<Action> {
        let table = MappingTable::standard(&AppConfig::default());
        let mut registry = ThrottleRegistry::new();
        table.evaluate(snapshot, &mut registry, Instant::now())
    }

    #[test]
    fn test_idle_pad_emits_nothing() {
        assert!(evaluate_once(&pad()).is_empty());
    }

    #[test]
    fn test_axes_inside_deadzone_never_emit() {
        let table = MappingTable::standard(&AppConfig::default());
        let mut registry = ThrottleRegistry::new();
        let start = Instant::now();

        for (step, value) in [-0.35f32, -0.3, -0.1, 0.0, 0.1, 0.2, 0.349, 0.35]
            .into_iter()
            .enumerate()
        {
            let snapshot = pad()
                .with_axis(layout::LEFT_X, value)
                .with_axis(layout::LEFT_Y, value)
                .with_axis(layout::RIGHT_X, value)
                .with_axis(layout::RIGHT_Y, value);
            let now = start + Duration::from_secs(step as u64);
            assert!(
                table.evaluate(&snapshot, &mut registry, now).is_empty(),
                "value {} emitted",
                value
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_left_stick_maps_to_navigation() {
        let actions = evaluate_once(&pad().with_axis(layout::LEFT_X, -0.6));
        assert_eq!(
            actions,
            vec![Action::NavigateDiscrete {
                direction: Direction::Left
            }]
        );

        let actions = evaluate_once(&pad().with_axis(layout::LEFT_Y, 0.9));
        assert_eq!(
            actions,
            vec![Action::NavigateDiscrete {
                direction: Direction::Down
            }]
        );
    }

    #[test]
    fn test_dpad_and_stick_share_one_window() {
        let table = MappingTable::standard(&AppConfig::default());
        let mut registry = ThrottleRegistry::new();
        let snapshot = pad()
            .with_button(layout::DPAD_LEFT, ButtonState::pressed())
            .with_axis(layout::LEFT_X, -1.0);

        let actions = table.evaluate(&snapshot, &mut registry, Instant::now());
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_right_stick_up_raises_volume() {
        let actions = evaluate_once(&pad().with_axis(layout::RIGHT_Y, -0.8));
        assert_eq!(
            actions,
            vec![Action::VolumeDelta {
                sign: VolumeSign::Up
            }]
        );

        let actions = evaluate_once(&pad().with_axis(layout::RIGHT_Y, 0.5));
        assert_eq!(
            actions,
            vec![Action::VolumeDelta {
                sign: VolumeSign::Down
            }]
        );
    }

    #[test]
    fn test_volume_axis_falls_back_when_primary_missing() {
        // driver reports only three axes, right stick vertical lands in slot 2
        let snapshot = pad().with_axis_count(3).with_axis(layout::RIGHT_X, 0.7);
        assert_eq!(
            evaluate_once(&snapshot),
            vec![Action::VolumeDelta {
                sign: VolumeSign::Down
            }]
        );

        // primary present and centered: fallback slot is ignored
        let snapshot = pad().with_axis(layout::RIGHT_X, 0.7);
        assert!(evaluate_once(&snapshot).is_empty());
    }

    #[test]
    fn test_analog_trigger_seeks_above_threshold() {
        let light = pad().with_button(layout::RIGHT_TRIGGER, ButtonState::analog(0.3));
        assert!(evaluate_once(&light).is_empty());

        let firm = pad().with_button(layout::RIGHT_TRIGGER, ButtonState::analog(0.55));
        assert_eq!(
            evaluate_once(&firm),
            vec![Action::Seek {
                direction: SeekDirection::Forward
            }]
        );
    }

    #[test]
    fn test_simultaneous_rules_all_fire_in_table_order() {
        let snapshot = pad()
            .with_button(layout::SOUTH, ButtonState::pressed())
            .with_button(layout::LEFT_BUMPER, ButtonState::pressed())
            .with_axis(layout::LEFT_Y, -0.9)
            .with_axis(layout::RIGHT_Y, -0.9);

        assert_eq!(
            evaluate_once(&snapshot),
            vec![
                Action::NavigateDiscrete {
                    direction: Direction::Up
                },
                Action::Confirm,
                Action::SkipTrack {
                    direction: TrackDirection::Previous
                },
                Action::VolumeDelta {
                    sign: VolumeSign::Up
                },
            ]
        );
    }

    #[test]
    fn test_held_trigger_repeats_at_seek_window() {
        let table = MappingTable::standard(&AppConfig::default());
        let mut registry = ThrottleRegistry::new();
        let start = Instant::now();
        let held = pad().with_button(layout::LEFT_TRIGGER, ButtonState::pressed());

        let emitted: Vec<u64> = (0..=400u64)
            .step_by(10)
            .filter(|t| {
                !table
                    .evaluate(&held, &mut registry, start + Duration::from_millis(*t))
                    .is_empty()
            })
            .collect();
        // a 10ms tick landing on the 130ms boundary is still held back
        assert_eq!(emitted, vec![0, 140, 280]);
    }
}
