//! Role state machine
//!
//! Every role maps to a fixed, ordered list of actions. The order never lets
//! two power paths be energized at once: entering `Device` cuts hub power
//! before Type-C VBUS comes up, while `None` moves the data switch back to the
//! hub before dropping VBUS. Hub power is only ever turned off for `Device`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::actuator::RoleContext;
use super::switch::RoleSwitch;
use super::types::{PowerState, Role, RoleAction, StepOutcome, SwitchPosition, TransitionReport};
use crate::cable::CableKind;
use crate::error::Result;

const NONE_PLAN: &[RoleAction] = &[
    RoleAction::Switch(SwitchPosition::Hub),
    RoleAction::TypecVbus(PowerState::Off),
    RoleAction::HubPower(PowerState::On),
    RoleAction::Cable(CableKind::Usb, false),
    RoleAction::Cable(CableKind::UsbHost, true),
];

const HOST_PLAN: &[RoleAction] = &[
    RoleAction::Switch(SwitchPosition::TypeC),
    RoleAction::TypecVbus(PowerState::On),
    RoleAction::Cable(CableKind::Usb, false),
    RoleAction::Cable(CableKind::UsbHost, true),
];

const DEVICE_PLAN: &[RoleAction] = &[
    RoleAction::HubPower(PowerState::Off),
    RoleAction::TypecVbus(PowerState::On),
    RoleAction::Switch(SwitchPosition::TypeC),
    RoleAction::Cable(CableKind::UsbHost, false),
    RoleAction::Cable(CableKind::Usb, true),
];

/// Ordered actions for entering `role`
pub fn plan(role: Role) -> &'static [RoleAction] {
    match role {
        Role::None => NONE_PLAN,
        Role::Host => HOST_PLAN,
        Role::Device => DEVICE_PLAN,
    }
}

impl RoleContext {
    /// Run a single action
    pub fn execute(&mut self, action: RoleAction) -> StepOutcome {
        match action {
            RoleAction::Switch(position) => self.set_switch(position),
            RoleAction::TypecVbus(state) => self.set_typec_vbus(state),
            RoleAction::HubPower(state) => self.set_hub_power(state),
            RoleAction::Cable(cable, attached) => {
                self.cable.set_state_sync(cable, attached);
                StepOutcome::Announced
            }
        }
    }

    /// Transition to `role`
    ///
    /// Runs every action of the plan; failed or absent steps are skipped and
    /// the cable announcement always happens.
    pub fn apply(&mut self, role: Role) -> TransitionReport {
        let mut report = TransitionReport::new(role);
        for action in plan(role) {
            let outcome = self.execute(*action);
            report.steps.push((*action, outcome));
        }
        self.role = role;
        report
    }
}

/// Role switch bound to a shared context
pub struct ContextRoleSwitch {
    context: Arc<Mutex<RoleContext>>,
}

impl ContextRoleSwitch {
    pub fn new(context: Arc<Mutex<RoleContext>>) -> Self {
        Self { context }
    }
}

impl RoleSwitch for ContextRoleSwitch {
    fn set_role(&self, role: Role) -> Result<()> {
        info!("set usb role to {}", role);
        let report = self.context.lock().apply(role);
        if report.failures() > 0 {
            warn!(
                "usb role {} applied with {} skipped step(s)",
                role,
                report.failures()
            );
        }
        Ok(())
    }

    fn get_role(&self) -> Role {
        self.context.lock().role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power_paths(plan: &[RoleAction]) -> (Option<PowerState>, Option<PowerState>) {
        let hub = plan.iter().find_map(|a| match a {
            RoleAction::HubPower(state) => Some(*state),
            _ => None,
        });
        let vbus = plan.iter().find_map(|a| match a {
            RoleAction::TypecVbus(state) => Some(*state),
            _ => None,
        });
        (hub, vbus)
    }

    #[test]
    fn test_plans_end_with_cable_announcement() {
        for role in Role::ALL {
            let actions = plan(role);
            let tail = &actions[actions.len() - 2..];
            assert!(tail
                .iter()
                .all(|a| matches!(a, RoleAction::Cable(..))));
        }
    }

    #[test]
    fn test_device_cuts_hub_before_vbus() {
        let actions = plan(Role::Device);
        let hub = actions
            .iter()
            .position(|a| *a == RoleAction::HubPower(PowerState::Off))
            .unwrap();
        let vbus = actions
            .iter()
            .position(|a| *a == RoleAction::TypecVbus(PowerState::On))
            .unwrap();
        assert!(hub < vbus);
    }

    #[test]
    fn test_host_leaves_hub_power_alone() {
        assert_eq!(power_paths(plan(Role::Host)), (None, Some(PowerState::On)));
        assert_eq!(
            power_paths(plan(Role::None)),
            (Some(PowerState::On), Some(PowerState::Off))
        );
        assert_eq!(
            power_paths(plan(Role::Device)),
            (Some(PowerState::Off), Some(PowerState::On))
        );
    }

    #[test]
    fn test_cable_states_per_role() {
        assert_eq!(
            &plan(Role::None)[3..],
            &[
                RoleAction::Cable(CableKind::Usb, false),
                RoleAction::Cable(CableKind::UsbHost, true)
            ]
        );
        assert_eq!(
            &plan(Role::Device)[3..],
            &[
                RoleAction::Cable(CableKind::UsbHost, false),
                RoleAction::Cable(CableKind::Usb, true)
            ]
        );
    }
}
