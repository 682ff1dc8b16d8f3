use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// A logical source permitted to command the actuator.
///
/// Declaration order is precedence order: a later variant outranks every
/// earlier one, so `Ord` can be used directly for arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Manual,
    ColorSort,
    StallRecovery,
}

impl Authority {
    pub fn all() -> &'static [Authority] {
        &[
            Authority::Manual,
            Authority::ColorSort,
            Authority::StallRecovery,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Authority::Manual => "manual",
            Authority::ColorSort => "color_sort",
            Authority::StallRecovery => "stall_recovery",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Authority {
    type Err = crate::error::IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Authority::Manual),
            "color_sort" => Ok(Authority::ColorSort),
            "stall_recovery" => Ok(Authority::StallRecovery),
            _ => Err(crate::error::IntakeError::InvalidAuthority(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandIntent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Spin at a signed velocity (units per minute).
    SetVelocity { velocity: f64 },
    /// Bounded relative move; `delta` in degrees, `speed` signed.
    RelativeMove { delta: f64, speed: f64 },
    /// Keep the actuator at its last commanded state.
    Hold,
}

impl CommandKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::SetVelocity { .. } => "set_velocity",
            CommandKind::RelativeMove { .. } => "relative_move",
            CommandKind::Hold => "hold",
        }
    }
}

/// One decision from one authority. Consumed immediately by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandIntent {
    pub authority: Authority,
    pub kind: CommandKind,
}

impl CommandIntent {
    pub fn new(authority: Authority, kind: CommandKind) -> Self {
        Self { authority, kind }
    }

    pub fn set_velocity(authority: Authority, velocity: f64) -> Self {
        Self::new(authority, CommandKind::SetVelocity { velocity })
    }

    pub fn relative_move(authority: Authority, delta: f64, speed: f64) -> Self {
        Self::new(authority, CommandKind::RelativeMove { delta, speed })
    }

    pub fn hold(authority: Authority) -> Self {
        Self::new(authority, CommandKind::Hold)
    }
}

// ---------------------------------------------------------------------------
// VelocitySample
// ---------------------------------------------------------------------------

/// Snapshot taken once per monitor tick. Not retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub actual: f64,
    pub commanded: f64,
}

impl VelocitySample {
    pub fn new(actual: f64, commanded: f64) -> Self {
        Self { actual, commanded }
    }
}

// ---------------------------------------------------------------------------
// Colours
// ---------------------------------------------------------------------------

/// The team this robot plays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    #[default]
    Red,
    Blue,
}

impl Alliance {
    pub fn as_str(self) -> &'static str {
        match self {
            Alliance::Red => "red",
            Alliance::Blue => "blue",
        }
    }

    pub fn opponent(self) -> Alliance {
        match self {
            Alliance::Red => Alliance::Blue,
            Alliance::Blue => Alliance::Red,
        }
    }
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Alliance {
    type Err = crate::error::IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Alliance::Red),
            "blue" => Ok(Alliance::Blue),
            _ => Err(crate::error::IntakeError::InvalidAlliance(s.to_string())),
        }
    }
}

/// Classification of an object relative to the configured alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceColor {
    Ally,
    Opposing,
    /// No object, or a hue outside every band.
    Unknown,
}

impl AllianceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            AllianceColor::Ally => "ally",
            AllianceColor::Opposing => "opposing",
            AllianceColor::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AllianceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    L1,
    L2,
    R1,
    R2,
    Up,
    Down,
    Left,
    Right,
    X,
    B,
    Y,
    A,
}

impl Button {
    pub fn as_str(self) -> &'static str {
        match self {
            Button::L1 => "l1",
            Button::L2 => "l2",
            Button::R1 => "r1",
            Button::R2 => "r2",
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::X => "x",
            Button::B => "b",
            Button::Y => "y",
            Button::A => "a",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Button {
    type Err = crate::error::IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(Button::L1),
            "l2" => Ok(Button::L2),
            "r1" => Ok(Button::R1),
            "r2" => Ok(Button::R2),
            "up" => Ok(Button::Up),
            "down" => Ok(Button::Down),
            "left" => Ok(Button::Left),
            "right" => Ok(Button::Right),
            "x" => Ok(Button::X),
            "b" => Ok(Button::B),
            "y" => Ok(Button::Y),
            "a" => Ok(Button::A),
            _ => Err(crate::error::IntakeError::InvalidButton(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_precedence_follows_declaration_order() {
        assert!(Authority::StallRecovery > Authority::ColorSort);
        assert!(Authority::ColorSort > Authority::Manual);
        assert_eq!(Authority::all().iter().max(), Some(&Authority::StallRecovery));
    }

    #[test]
    fn authority_parses_its_own_label() {
        for a in Authority::all() {
            assert_eq!(a.as_str().parse::<Authority>().unwrap(), *a);
        }
        assert!("operator".parse::<Authority>().is_err());
    }

    #[test]
    fn alliance_parse_is_case_insensitive() {
        assert_eq!("BLUE".parse::<Alliance>().unwrap(), Alliance::Blue);
        assert_eq!(Alliance::Red.opponent(), Alliance::Blue);
        assert!("green".parse::<Alliance>().is_err());
    }

    #[test]
    fn command_kind_serializes_tagged() {
        let intent = CommandIntent::relative_move(Authority::StallRecovery, -90.0, -100.0);
        let json = serde_json::to_value(intent).unwrap();
        assert_eq!(json["authority"], "stall_recovery");
        assert_eq!(json["kind"]["type"], "relative_move");
        assert_eq!(json["kind"]["delta"], -90.0);
    }
}
