use crate::classifier::ColorBands;
use crate::error::{IntakeError, Result};
use crate::types::{Alliance, Button};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StallConfig
// ---------------------------------------------------------------------------

/// How `|actual|` is compared against `velocity_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdComparison {
    /// `|actual| < threshold` is a stall.
    #[default]
    Below,
    /// `|actual| <= threshold` is a stall.
    AtOrBelow,
}

impl ThresholdComparison {
    pub fn is_below(self, magnitude: f64, threshold: f64) -> bool {
        match self {
            ThresholdComparison::Below => magnitude < threshold,
            ThresholdComparison::AtOrBelow => magnitude <= threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallConfig {
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: f64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default)]
    pub comparison: ThresholdComparison,
    #[serde(default = "default_monitor_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_velocity_threshold() -> f64 {
    50.0
}

fn default_grace_ms() -> u64 {
    200
}

fn default_monitor_poll_ms() -> u64 {
    20
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: default_velocity_threshold(),
            grace_ms: default_grace_ms(),
            comparison: ThresholdComparison::default(),
            poll_interval_ms: default_monitor_poll_ms(),
        }
    }
}

impl StallConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// RecoveryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Magnitude of the reversal; always applied against the intake direction.
    #[serde(default = "default_reverse_degrees")]
    pub reverse_degrees: f64,
    #[serde(default = "default_reverse_speed")]
    pub reverse_speed: f64,
    /// `|actual|` at or below this counts as "motion finished".
    #[serde(default = "default_settle_velocity")]
    pub settle_velocity: f64,
    #[serde(default = "default_recovery_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_reverse_degrees() -> f64 {
    90.0
}

fn default_reverse_speed() -> f64 {
    -100.0
}

fn default_settle_velocity() -> f64 {
    1.0
}

fn default_recovery_poll_ms() -> u64 {
    10
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            reverse_degrees: default_reverse_degrees(),
            reverse_speed: default_reverse_speed(),
            settle_velocity: default_settle_velocity(),
            poll_interval_ms: default_recovery_poll_ms(),
        }
    }
}

impl RecoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// SortConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    /// Time for an object to travel from the sensor to the eject point.
    #[serde(default = "default_travel_delay_ms")]
    pub travel_delay_ms: u64,
    /// Time the intake stays stopped while the object flies off.
    #[serde(default = "default_stop_delay_ms")]
    pub stop_delay_ms: u64,
    /// Velocity re-issued when the eject window closes.
    #[serde(default = "default_intake_velocity")]
    pub intake_velocity: f64,
    #[serde(default = "default_sort_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_travel_delay_ms() -> u64 {
    100
}

fn default_stop_delay_ms() -> u64 {
    200
}

fn default_intake_velocity() -> f64 {
    600.0
}

fn default_sort_poll_ms() -> u64 {
    50
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            travel_delay_ms: default_travel_delay_ms(),
            stop_delay_ms: default_stop_delay_ms(),
            intake_velocity: default_intake_velocity(),
            poll_interval_ms: default_sort_poll_ms(),
        }
    }
}

impl SortConfig {
    pub fn travel_delay(&self) -> Duration {
        Duration::from_millis(self.travel_delay_ms)
    }

    pub fn stop_delay(&self) -> Duration {
        Duration::from_millis(self.stop_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// OperatorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntakeMode {
    /// Intake runs while the button is held.
    #[default]
    Hold,
    /// Each new press flips the intake on or off.
    Toggle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_intake_button")]
    pub intake_button: Button,
    #[serde(default = "default_reverse_button")]
    pub reverse_button: Button,
    #[serde(default = "default_intake_velocity")]
    pub intake_velocity: f64,
    #[serde(default)]
    pub mode: IntakeMode,
    #[serde(default = "default_operator_poll_ms")]
    pub poll_interval_ms: u64,
    /// Run the colour-sort task alongside operator control.
    #[serde(default = "default_color_sort")]
    pub color_sort: bool,
}

fn default_intake_button() -> Button {
    Button::R1
}

fn default_reverse_button() -> Button {
    Button::R2
}

fn default_operator_poll_ms() -> u64 {
    20
}

fn default_color_sort() -> bool {
    true
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            intake_button: default_intake_button(),
            reverse_button: default_reverse_button(),
            intake_velocity: default_intake_velocity(),
            mode: IntakeMode::default(),
            poll_interval_ms: default_operator_poll_ms(),
            color_sort: default_color_sort(),
        }
    }
}

impl OperatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub alliance: Alliance,
    #[serde(default)]
    pub stall: StallConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub sort: SortConfig,
    #[serde(default)]
    pub colors: ColorBands,
    #[serde(default)]
    pub operator: OperatorConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IntakeError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(data)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Check for settings that are legal YAML but unsafe or nonsensical on
    /// the robot. Returns an empty list when everything looks fine.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(self.stall.velocity_threshold.is_finite() && self.stall.velocity_threshold > 0.0) {
            warnings.push(ConfigWarning::error(format!(
                "stall.velocity_threshold must be positive, got {}",
                self.stall.velocity_threshold
            )));
        }
        if self.stall.grace_ms < 100 {
            warnings.push(ConfigWarning::warning(format!(
                "stall.grace_ms = {} is shorter than a typical motor spin-up",
                self.stall.grace_ms
            )));
        }

        for (name, ms) in [
            ("stall.poll_interval_ms", self.stall.poll_interval_ms),
            ("recovery.poll_interval_ms", self.recovery.poll_interval_ms),
            ("sort.poll_interval_ms", self.sort.poll_interval_ms),
            ("operator.poll_interval_ms", self.operator.poll_interval_ms),
        ] {
            if ms == 0 {
                warnings.push(ConfigWarning::error(format!("{name} must be non-zero")));
            }
        }

        if !(self.recovery.reverse_degrees.is_finite() && self.recovery.reverse_degrees > 0.0) {
            warnings.push(ConfigWarning::error(format!(
                "recovery.reverse_degrees must be positive, got {}",
                self.recovery.reverse_degrees
            )));
        }
        if !self.recovery.reverse_speed.is_finite() || self.recovery.reverse_speed == 0.0 {
            warnings.push(ConfigWarning::error(
                "recovery.reverse_speed must be a non-zero number",
            ));
        } else if self.recovery.reverse_speed.signum() == self.operator.intake_velocity.signum() {
            warnings.push(ConfigWarning::warning(format!(
                "recovery.reverse_speed ({}) runs in the intake direction ({})",
                self.recovery.reverse_speed, self.operator.intake_velocity
            )));
        }

        if self.sort.travel_delay_ms == 0 {
            warnings.push(ConfigWarning::warning(
                "sort.travel_delay_ms is 0: objects are stopped before reaching the eject point",
            ));
        }
        if self.sort.stop_delay_ms == 0 {
            warnings.push(ConfigWarning::warning(
                "sort.stop_delay_ms is 0: the intake never actually stops to eject",
            ));
        }

        for (name, band) in [("colors.red", &self.colors.red), ("colors.blue", &self.colors.blue)] {
            if !band.is_valid() {
                warnings.push(ConfigWarning::error(format!(
                    "{name} band [{}, {}] must lie within [0, 360]",
                    band.start, band.end
                )));
            }
        }
        if self.colors.red.overlaps(&self.colors.blue) {
            warnings.push(ConfigWarning::error(
                "colors.red and colors.blue bands overlap",
            ));
        }

        if self.operator.intake_button == self.operator.reverse_button {
            warnings.push(ConfigWarning::error(format!(
                "operator.intake_button and operator.reverse_button are both {}",
                self.operator.intake_button
            )));
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}
