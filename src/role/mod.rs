//! USB Role Switch Module
//!
//! Routes USB traffic and power between an on-board hub and a Type-C port.
//! Exactly one of the hub path, the Type-C host path and the Type-C device
//! path is active once a transition completes.
//!
//! # Hardware
//!
//! - **Hub power**: enable line for the hub VBUS (optional)
//! - **Type-C VBUS**: enable line for the Type-C VBUS rail, with configurable polarity
//! - **Data switch**: selects hub or Type-C data path (hikey960 boards only)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use usb_role_switch::cable::CableNotifier;
//! use usb_role_switch::config::UsbRoleConfig;
//! use usb_role_switch::gpio::{cdev::CdevProvider, LineManager};
//! use usb_role_switch::role::{Role, RoleSwitchClass, UsbRoleController};
//!
//! let config = UsbRoleConfig::load("/etc/usb-role-switch/config.toml".as_ref())?;
//! let lines = LineManager::new(Arc::new(CdevProvider::new()));
//! let class = RoleSwitchClass::new();
//! let controller = UsbRoleController::initialize(
//!     &config,
//!     &lines,
//!     Arc::new(CableNotifier::new("usb")),
//!     &class,
//! )?;
//!
//! class.set_role(&config.name, Role::Device)?;
//! assert_eq!(controller.get_role(), Role::Device);
//! controller.teardown();
//! ```

mod actuator;
mod controller;
mod machine;
mod switch;
mod types;

pub use actuator::RoleContext;
pub use controller::{LineStatus, RoleSwitchStatus, UsbRoleController, SUPPORTED_CABLES};
pub use machine::{plan, ContextRoleSwitch};
pub use switch::{RoleSwitch, RoleSwitchClass, RoleSwitchDesc, RoleSwitchHandle};
pub use types::{
    ActiveLevel, PowerState, Role, RoleAction, StepOutcome, SwitchPosition, TransitionReport,
};
