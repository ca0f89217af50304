//! Role switch data types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cable::CableKind;
use crate::error::AppError;
use crate::gpio::Level;

/// USB operating role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No Type-C role; traffic goes through the on-board hub
    #[default]
    None,
    /// Type-C port acts as host and sources VBUS
    Host,
    /// Type-C port acts as peripheral
    Device,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::None, Role::Host, Role::Device];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Host => "host",
            Role::Device => "device",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Role::None),
            "host" => Ok(Role::Host),
            "device" | "peripheral" => Ok(Role::Device),
            other => Err(AppError::Config(format!("Unknown USB role: {}", other))),
        }
    }
}

/// Data-path switch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchPosition {
    Hub,
    TypeC,
}

impl SwitchPosition {
    /// Line level selecting this position
    pub fn level(&self) -> Level {
        match self {
            SwitchPosition::Hub => Level::High,
            SwitchPosition::TypeC => Level::Low,
        }
    }
}

impl fmt::Display for SwitchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchPosition::Hub => write!(f, "hub"),
            SwitchPosition::TypeC => write!(f, "typec"),
        }
    }
}

/// Power rail state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// Active level for GPIO pins
///
/// Accepts `"high"`/`"low"` or a raw integer where any non-zero value means high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawActiveLevel")]
pub enum ActiveLevel {
    /// Active high (default for most cases)
    High,
    /// Active low (inverted)
    Low,
}

impl Default for ActiveLevel {
    fn default() -> Self {
        Self::High
    }
}

impl ActiveLevel {
    /// Line level for a given power state
    pub fn level_for(&self, state: PowerState) -> Level {
        let active = match self {
            ActiveLevel::High => Level::High,
            ActiveLevel::Low => Level::Low,
        };
        match state {
            PowerState::On => active,
            PowerState::Off => !active,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawActiveLevel {
    Int(i64),
    Name(String),
}

impl TryFrom<RawActiveLevel> for ActiveLevel {
    type Error = String;

    fn try_from(raw: RawActiveLevel) -> Result<Self, Self::Error> {
        match raw {
            RawActiveLevel::Int(0) => Ok(ActiveLevel::Low),
            RawActiveLevel::Int(_) => Ok(ActiveLevel::High),
            RawActiveLevel::Name(name) => match name.to_ascii_lowercase().as_str() {
                "high" => Ok(ActiveLevel::High),
                "low" => Ok(ActiveLevel::Low),
                other => Err(format!("invalid active level: {}", other)),
            },
        }
    }
}

/// One step of a role transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    Switch(SwitchPosition),
    TypecVbus(PowerState),
    HubPower(PowerState),
    Cable(CableKind, bool),
}

/// Result of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Line not present on this board
    Absent,
    /// Line already at the requested level
    Unchanged,
    /// Line written
    Written,
    /// Write failed, step skipped
    Failed,
    /// Cable state announced
    Announced,
}

/// Outcome of every step of a transition, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub role: Role,
    pub steps: Vec<(RoleAction, StepOutcome)>,
}

impl TransitionReport {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            steps: Vec::new(),
        }
    }

    /// Number of hardware writes performed
    pub fn writes(&self) -> usize {
        self.count(StepOutcome::Written)
    }

    pub fn failures(&self) -> usize {
        self.count(StepOutcome::Failed)
    }

    pub fn outcome_of(&self, action: RoleAction) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|(step, _)| *step == action)
            .map(|(_, outcome)| *outcome)
    }

    pub fn actions(&self) -> Vec<RoleAction> {
        self.steps.iter().map(|(action, _)| *action).collect()
    }

    fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|(_, o)| *o == outcome).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("host".parse::<Role>().unwrap(), Role::Host);
        assert_eq!(" Device ".parse::<Role>().unwrap(), Role::Device);
        assert_eq!("none".parse::<Role>().unwrap(), Role::None);
        assert!("otg".parse::<Role>().is_err());

        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_default() {
        assert_eq!(Role::default(), Role::None);
    }

    #[test]
    fn test_switch_levels() {
        assert_eq!(SwitchPosition::Hub.level(), Level::High);
        assert_eq!(SwitchPosition::TypeC.level(), Level::Low);
    }

    #[test]
    fn test_active_level_mapping() {
        assert_eq!(ActiveLevel::High.level_for(PowerState::On), Level::High);
        assert_eq!(ActiveLevel::High.level_for(PowerState::Off), Level::Low);
        assert_eq!(ActiveLevel::Low.level_for(PowerState::On), Level::Low);
        assert_eq!(ActiveLevel::Low.level_for(PowerState::Off), Level::High);
    }

    #[test]
    fn test_active_level_from_raw() {
        #[derive(Deserialize)]
        struct Holder {
            level: ActiveLevel,
        }

        let parse = |s: &str| toml::from_str::<Holder>(s).map(|h| h.level);
        assert_eq!(parse("level = 1").unwrap(), ActiveLevel::High);
        assert_eq!(parse("level = 7").unwrap(), ActiveLevel::High);
        assert_eq!(parse("level = 0").unwrap(), ActiveLevel::Low);
        assert_eq!(parse("level = \"low\"").unwrap(), ActiveLevel::Low);
        assert!(parse("level = \"sideways\"").is_err());
    }

    #[test]
    fn test_report_counts() {
        let mut report = TransitionReport::new(Role::Host);
        report
            .steps
            .push((RoleAction::Switch(SwitchPosition::TypeC), StepOutcome::Written));
        report
            .steps
            .push((RoleAction::TypecVbus(PowerState::On), StepOutcome::Failed));
        report
            .steps
            .push((RoleAction::Cable(CableKind::Usb, false), StepOutcome::Announced));

        assert_eq!(report.writes(), 1);
        assert_eq!(report.failures(), 1);
        assert_eq!(
            report.outcome_of(RoleAction::TypecVbus(PowerState::On)),
            Some(StepOutcome::Failed)
        );
        assert_eq!(report.outcome_of(RoleAction::HubPower(PowerState::On)), None);
    }
}
