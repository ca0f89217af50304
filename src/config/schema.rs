use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
pub use crate::gpio::LineId;
pub use crate::role::ActiveLevel;

/// Board variant, selected by device-tree compatible string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformVariant {
    /// Hub and Type-C VBUS lines only
    GpioHubV1,
    /// Adds a discrete hub / Type-C data switch
    Hikey960,
}

impl Default for PlatformVariant {
    fn default() -> Self {
        Self::GpioHubV1
    }
}

impl PlatformVariant {
    pub const COMPATIBLES: [(&'static str, PlatformVariant); 2] = [
        ("hisilicon,gpio_hubv1", PlatformVariant::GpioHubV1),
        ("hisilicon,hikey960_usb", PlatformVariant::Hikey960),
    ];

    /// Match a compatible string
    pub fn from_compatible(compatible: &str) -> Option<Self> {
        Self::COMPATIBLES
            .iter()
            .find(|(name, _)| *name == compatible)
            .map(|(_, variant)| *variant)
    }

    pub fn compatible(&self) -> &'static str {
        match self {
            PlatformVariant::GpioHubV1 => "hisilicon,gpio_hubv1",
            PlatformVariant::Hikey960 => "hisilicon,hikey960_usb",
        }
    }

    /// Whether the board carries the hub / Type-C data switch
    pub fn requires_switch(&self) -> bool {
        matches!(self, PlatformVariant::Hikey960)
    }
}

impl fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.compatible())
    }
}

impl FromStr for PlatformVariant {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpio_hub_v1" => Ok(PlatformVariant::GpioHubV1),
            "hikey960" => Ok(PlatformVariant::Hikey960),
            other => Self::from_compatible(other)
                .ok_or_else(|| AppError::Config(format!("Unknown platform variant: {}", other))),
        }
    }
}

/// What to do when the switch line of a switch-equipped board is unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchFailurePolicy {
    /// Roll back and fail initialization
    Abort,
    /// Log and continue without the switch
    Continue,
}

impl Default for SwitchFailurePolicy {
    fn default() -> Self {
        Self::Abort
    }
}

/// Role switch controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsbRoleConfig {
    /// Role switch registration name
    pub name: String,
    /// Board variant
    pub variant: PlatformVariant,
    /// Hub power enable line
    ///
    /// Boards without an on-board hub leave this unset and every hub power
    /// step is skipped. A line that is set but cannot be claimed or driven
    /// fails initialization.
    pub hub_power: Option<LineId>,
    /// Type-C VBUS enable line (mandatory)
    pub typec_vbus: Option<LineId>,
    /// Level at which Type-C VBUS is on (mandatory)
    pub typec_vbus_active_level: Option<ActiveLevel>,
    /// Hub / Type-C data switch line (used by switch-equipped variants)
    pub switch: Option<LineId>,
    /// Behaviour when the switch line cannot be set up
    pub switch_failure_policy: SwitchFailurePolicy,
    /// Allow manual role changes
    pub allow_userspace_control: bool,
    /// GPIO consumer label
    pub consumer: String,
}

impl Default for UsbRoleConfig {
    fn default() -> Self {
        Self {
            name: "hisi_hikey_usb".to_string(),
            variant: PlatformVariant::GpioHubV1,
            hub_power: None,
            typec_vbus: None,
            typec_vbus_active_level: None,
            switch: None,
            switch_failure_policy: SwitchFailurePolicy::Abort,
            allow_userspace_control: true,
            consumer: "usb-role-switch".to_string(),
        }
    }
}

impl UsbRoleConfig {
    /// Reject values that cannot work regardless of hardware
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Config("name must not be empty".to_string()));
        }
        if self.consumer.trim().is_empty() {
            return Err(AppError::Config("consumer must not be empty".to_string()));
        }

        let lines = [&self.hub_power, &self.typec_vbus, &self.switch];
        for (i, a) in lines.iter().enumerate() {
            for b in &lines[i + 1..] {
                if let (Some(a), Some(b)) = (a, b) {
                    if a == b {
                        return Err(AppError::Config(format!("line {} configured twice", a)));
                    }
                }
            }
        }
        Ok(())
    }

    /// All configured line identifiers
    pub fn lines(&self) -> Vec<&LineId> {
        [&self.hub_power, &self.typec_vbus, &self.switch]
            .into_iter()
            .flatten()
            .collect()
    }
}
