//! Collaborator interfaces implemented outside the core.
//!
//! The core never talks to hardware directly; the motor driver, colour
//! sensor, controller screen and gamepad are all reached through these traits,
//! which keeps every state machine testable without a robot.

use crate::types::Button;

/// The physical intake motor. Velocity control itself (PID) is the driver's job.
pub trait ActuatorHandle: Send {
    fn set_velocity(&mut self, velocity: f64);

    /// Issue a bounded relative move. Returns immediately.
    fn move_relative(&mut self, delta_degrees: f64, speed: f64);

    fn actual_velocity(&self) -> f64;

    fn target_velocity(&self) -> f64;

    /// True once the last commanded motion has completed.
    fn is_stopped(&self) -> bool;
}

/// Colour sensor facing the intake path.
pub trait HueSensor: Send {
    /// Hue in `[0, 360)`, or `None` when no object is in front of the sensor.
    fn read_hue(&mut self) -> Option<f64>;
}

/// Controller screen / LCD. Fire-and-forget.
pub trait DiagnosticsSink: Send + Sync {
    fn write(&self, line: u8, text: &str);
}

/// Gamepad buttons.
pub trait ManualInputSource: Send {
    fn digital_pressed(&self, button: Button) -> bool;

    /// Edge-triggered: true only on the first poll after the button goes down.
    fn digital_new_press(&mut self, button: Button) -> bool;
}

/// Sink that drops everything; for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn write(&self, _line: u8, _text: &str) {}
}
