//! Simulated collaborators for headless runs and tests.
//!
//! All of them read time from a [`Clock`], so under a paused tokio clock
//! their behaviour is fully deterministic.

use crate::clock::Clock;
use intake_core::{ActuatorHandle, Button, CommandKind, HueSensor, ManualInputSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One revolution per minute is six degrees per second.
const DEG_PER_SEC_PER_RPM: f64 = 6.0;

// ---------------------------------------------------------------------------
// SimActuator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimActuatorConfig {
    /// Time to ramp linearly from one commanded velocity to the next.
    pub spin_up: Duration,
    /// Velocity magnitude reported while jammed and driven.
    pub jam_velocity: f64,
}

impl Default for SimActuatorConfig {
    fn default() -> Self {
        Self {
            spin_up: Duration::from_millis(150),
            jam_velocity: 10.0,
        }
    }
}

/// A command as the motor received it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorEvent {
    pub at: Instant,
    pub command: CommandKind,
}

#[derive(Debug, Clone, Copy)]
struct Jam {
    from: Instant,
    /// `None`: stays until a reversal clears it.
    until: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
struct RelativeMotion {
    velocity: f64,
    until: Instant,
    clears_jam: bool,
}

#[derive(Debug)]
struct SimState {
    target: f64,
    ramp_from: f64,
    changed_at: Instant,
    relative: Option<RelativeMotion>,
    jam: Option<Jam>,
    override_velocity: Option<f64>,
    log: Vec<ActuatorEvent>,
}

impl SimState {
    fn settle(&mut self, now: Instant) {
        let Some(motion) = self.relative.as_mut() else {
            return;
        };
        if now < motion.until || !motion.clears_jam {
            return;
        }
        motion.clears_jam = false;
        if let Some(jam) = self.jam {
            if jam.until.is_none() && jam.from <= motion.until {
                self.jam = None;
                tracing::debug!("simulated jam cleared by reversal");
            }
        }
    }

    fn jam_active(&self, now: Instant) -> bool {
        self.jam
            .is_some_and(|j| now >= j.from && j.until.map_or(true, |u| now < u))
    }

    fn velocity(&mut self, now: Instant, config: &SimActuatorConfig) -> f64 {
        self.settle(now);
        if let Some(motion) = self.relative {
            return if now < motion.until { motion.velocity } else { 0.0 };
        }
        if let Some(v) = self.override_velocity {
            return v;
        }
        if self.target != 0.0 && self.jam_active(now) {
            return config.jam_velocity.copysign(self.target);
        }
        let elapsed = now.saturating_duration_since(self.changed_at);
        let progress = if config.spin_up.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / config.spin_up.as_secs_f64()).min(1.0)
        };
        self.ramp_from + (self.target - self.ramp_from) * progress
    }
}

/// Velocity-controlled motor model. Clones share one motor.
#[derive(Clone)]
pub struct SimActuator {
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock>,
    config: SimActuatorConfig,
}

impl SimActuator {
    pub fn new(clock: Arc<dyn Clock>, config: SimActuatorConfig) -> Self {
        let now = clock.now();
        Self {
            state: Arc::new(Mutex::new(SimState {
                target: 0.0,
                ramp_from: 0.0,
                changed_at: now,
                relative: None,
                jam: None,
                override_velocity: None,
                log: Vec::new(),
            })),
            clock,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jam now, until the next reversal.
    pub fn jam(&self) {
        self.schedule_jam(Duration::ZERO, None);
    }

    /// Jam starting `after` from now. With `lasting` set the jam ignores
    /// reversals and clears itself when the time is up.
    pub fn schedule_jam(&self, after: Duration, lasting: Option<Duration>) {
        let from = self.clock.now() + after;
        self.lock().jam = Some(Jam {
            from,
            until: lasting.map(|d| from + d),
        });
    }

    pub fn is_jammed(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        state.settle(now);
        state.jam_active(now)
    }

    /// Force the reported velocity outside relative moves.
    pub fn set_actual_override(&self, velocity: Option<f64>) {
        self.lock().override_velocity = velocity;
    }

    pub fn commands(&self) -> Vec<ActuatorEvent> {
        self.lock().log.clone()
    }
}

impl std::fmt::Debug for SimActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimActuator")
            .field("target", &state.target)
            .field("jam", &state.jam.is_some())
            .field("commands", &state.log.len())
            .finish()
    }
}

impl ActuatorHandle for SimActuator {
    fn set_velocity(&mut self, velocity: f64) {
        let now = self.clock.now();
        let mut state = self.lock();
        // Re-sending the running target must not restart the ramp.
        if state.relative.is_some() || state.target != velocity {
            let current = state.velocity(now, &self.config);
            state.relative = None;
            state.ramp_from = current;
            state.changed_at = now;
            state.target = velocity;
        }
        state.log.push(ActuatorEvent {
            at: now,
            command: CommandKind::SetVelocity { velocity },
        });
    }

    fn move_relative(&mut self, delta_degrees: f64, speed: f64) {
        let now = self.clock.now();
        let rate = speed.abs() * DEG_PER_SEC_PER_RPM;
        let duration = if rate > 0.0 {
            Duration::from_secs_f64(delta_degrees.abs() / rate)
        } else {
            Duration::ZERO
        };
        let mut state = self.lock();
        state.settle(now);
        state.relative = Some(RelativeMotion {
            velocity: speed.abs().copysign(delta_degrees),
            until: now + duration,
            clears_jam: delta_degrees < 0.0,
        });
        state.target = speed;
        state.log.push(ActuatorEvent {
            at: now,
            command: CommandKind::RelativeMove {
                delta: delta_degrees,
                speed,
            },
        });
    }

    fn actual_velocity(&self) -> f64 {
        let now = self.clock.now();
        self.lock().velocity(now, &self.config)
    }

    fn target_velocity(&self) -> f64 {
        self.lock().target
    }

    fn is_stopped(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        let relative = state.relative;
        match relative {
            Some(motion) => now >= motion.until,
            None => state.velocity(now, &self.config) == 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedHueSensor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ObjectPass {
    at: Duration,
    dwell: Duration,
    hue: f64,
}

/// Reports a hue while a scripted object is in front of the sensor.
pub struct ScriptedHueSensor {
    clock: Arc<dyn Clock>,
    start: Instant,
    objects: Vec<ObjectPass>,
}

impl ScriptedHueSensor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            objects: Vec::new(),
        }
    }

    /// An object of `hue` passes the sensor from `at` for `dwell`.
    pub fn with_object(mut self, at: Duration, dwell: Duration, hue: f64) -> Self {
        self.objects.push(ObjectPass { at, dwell, hue });
        self
    }
}

impl HueSensor for ScriptedHueSensor {
    fn read_hue(&mut self) -> Option<f64> {
        let elapsed = self.clock.now().saturating_duration_since(self.start);
        self.objects
            .iter()
            .find(|o| elapsed >= o.at && elapsed < o.at + o.dwell)
            .map(|o| o.hue)
    }
}

// ---------------------------------------------------------------------------
// ScriptedInput
// ---------------------------------------------------------------------------

/// Gamepad whose buttons are held during scripted windows.
pub struct ScriptedInput {
    clock: Arc<dyn Clock>,
    start: Instant,
    holds: Vec<(Button, Duration, Duration)>,
    last_seen: HashMap<Button, bool>,
}

impl ScriptedInput {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            holds: Vec::new(),
            last_seen: HashMap::new(),
        }
    }

    /// Hold `button` from `from` until `until` (exclusive).
    pub fn hold(mut self, button: Button, from: Duration, until: Duration) -> Self {
        self.holds.push((button, from, until));
        self
    }
}

impl ManualInputSource for ScriptedInput {
    fn digital_pressed(&self, button: Button) -> bool {
        let elapsed = self.clock.now().saturating_duration_since(self.start);
        self.holds
            .iter()
            .any(|&(b, from, until)| b == button && elapsed >= from && elapsed < until)
    }

    fn digital_new_press(&mut self, button: Button) -> bool {
        let pressed = self.digital_pressed(button);
        let was = self.last_seen.insert(button, pressed).unwrap_or(false);
        pressed && !was
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(TokioClock)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_ramps_to_target() {
        let mut motor = SimActuator::new(clock(), SimActuatorConfig::default());
        motor.set_velocity(600.0);
        assert_eq!(motor.actual_velocity(), 0.0);
        advance(75).await;
        assert!((motor.actual_velocity() - 300.0).abs() < 1e-6);
        advance(100).await;
        assert_eq!(motor.actual_velocity(), 600.0);
        assert_eq!(motor.target_velocity(), 600.0);
        assert!(!motor.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn jam_holds_velocity_low_until_reversal() {
        let mut motor = SimActuator::new(clock(), SimActuatorConfig::default());
        motor.set_velocity(600.0);
        advance(200).await;
        motor.jam();
        assert_eq!(motor.actual_velocity(), 10.0);

        // 90 degrees at 100 rpm takes 150 ms
        motor.move_relative(-90.0, -100.0);
        assert_eq!(motor.actual_velocity(), -100.0);
        assert!(!motor.is_stopped());
        advance(150).await;
        assert!(motor.is_stopped());
        assert_eq!(motor.actual_velocity(), 0.0);
        assert!(!motor.is_jammed());

        motor.set_velocity(600.0);
        advance(200).await;
        assert_eq!(motor.actual_velocity(), 600.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_jam_survives_reversal() {
        let mut motor = SimActuator::new(clock(), SimActuatorConfig::default());
        motor.set_velocity(600.0);
        motor.schedule_jam(Duration::ZERO, Some(Duration::from_millis(500)));
        advance(200).await;
        motor.move_relative(-90.0, -100.0);
        advance(150).await;
        motor.set_velocity(600.0);
        assert!(motor.is_jammed());
        assert_eq!(motor.actual_velocity(), 10.0);
        advance(200).await;
        assert!(!motor.is_jammed());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_logged_in_order() {
        let mut motor = SimActuator::new(clock(), SimActuatorConfig::default());
        motor.set_velocity(600.0);
        advance(10).await;
        motor.move_relative(-90.0, -100.0);
        let log = motor.commands();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].command, CommandKind::SetVelocity { velocity: 600.0 });
        assert_eq!(
            log[1].command,
            CommandKind::RelativeMove {
                delta: -90.0,
                speed: -100.0
            }
        );
        assert_eq!(log[1].at - log[0].at, Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn hue_sensor_reports_objects_in_window() {
        let mut sensor = ScriptedHueSensor::new(clock()).with_object(
            Duration::from_millis(100),
            Duration::from_millis(50),
            240.0,
        );
        assert_eq!(sensor.read_hue(), None);
        advance(100).await;
        assert_eq!(sensor.read_hue(), Some(240.0));
        advance(50).await;
        assert_eq!(sensor.read_hue(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn new_press_is_edge_triggered() {
        let mut input = ScriptedInput::new(clock()).hold(
            Button::R1,
            Duration::ZERO,
            Duration::from_millis(100),
        );
        assert!(input.digital_pressed(Button::R1));
        assert!(input.digital_new_press(Button::R1));
        assert!(!input.digital_new_press(Button::R1));
        assert!(!input.digital_pressed(Button::R2));
        advance(100).await;
        assert!(!input.digital_new_press(Button::R1));
        assert!(!input.digital_pressed(Button::R1));
    }
}
