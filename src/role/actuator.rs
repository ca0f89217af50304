//! Power and data-path actuator
//!
//! Owns the claimed lines and applies single, idempotent level changes.
//! A step on an absent line or a failed write is logged and skipped.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::types::{ActiveLevel, PowerState, Role, StepOutcome, SwitchPosition};
use crate::cable::CableSink;
use crate::gpio::{ClaimedLine, Level};

/// Shared hardware context of one role switch
pub struct RoleContext {
    pub(crate) hub_power: Option<ClaimedLine>,
    pub(crate) typec_vbus: Option<ClaimedLine>,
    typec_vbus_active: ActiveLevel,
    pub(crate) switch: Option<ClaimedLine>,
    pub(crate) cable: Arc<dyn CableSink>,
    pub(crate) role: Role,
}

impl RoleContext {
    pub fn new(
        hub_power: Option<ClaimedLine>,
        typec_vbus: Option<ClaimedLine>,
        typec_vbus_active: ActiveLevel,
        switch: Option<ClaimedLine>,
        cable: Arc<dyn CableSink>,
    ) -> Self {
        Self {
            hub_power,
            typec_vbus,
            typec_vbus_active,
            switch,
            cable,
            role: Role::None,
        }
    }

    pub fn typec_vbus_active(&self) -> ActiveLevel {
        self.typec_vbus_active
    }

    /// Role of the last completed transition
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn hub_power_line(&self) -> Option<&ClaimedLine> {
        self.hub_power.as_ref()
    }

    pub fn typec_vbus_line(&self) -> Option<&ClaimedLine> {
        self.typec_vbus.as_ref()
    }

    pub fn switch_line(&self) -> Option<&ClaimedLine> {
        self.switch.as_ref()
    }

    /// Drive the hub power enable line
    pub fn set_hub_power(&mut self, state: PowerState) -> StepOutcome {
        let Some(line) = self.hub_power.as_mut() else {
            debug!("hub power line absent, skipping");
            return StepOutcome::Absent;
        };

        let level = match state {
            PowerState::On => Level::High,
            PowerState::Off => Level::Low,
        };
        if line.current_level() == Some(level) {
            info!("hub power no change");
            return StepOutcome::Unchanged;
        }

        drive(line, level, &format!("hub power {}", state))
    }

    /// Drive the Type-C VBUS enable line, honouring its polarity
    pub fn set_typec_vbus(&mut self, state: PowerState) -> StepOutcome {
        let level = self.typec_vbus_active.level_for(state);
        let Some(line) = self.typec_vbus.as_mut() else {
            error!("typec power line is absent");
            return StepOutcome::Absent;
        };

        if line.current_level() == Some(level) {
            info!("typec power no change");
            return StepOutcome::Unchanged;
        }

        drive(line, level, &format!("set typec vbus to {}", level))
    }

    /// Move the hub / Type-C data switch
    pub fn set_switch(&mut self, target: SwitchPosition) -> StepOutcome {
        let Some(line) = self.switch.as_mut() else {
            error!("otg switch line is absent");
            return StepOutcome::Absent;
        };

        if line.current_level() == Some(target.level()) {
            info!("already switch to {}", target);
            return StepOutcome::Unchanged;
        }

        drive(line, target.level(), &format!("switch to {}", target))
    }

    /// Release every claimed line, switch first
    pub fn release_lines(&mut self) {
        for line in [
            self.switch.as_mut(),
            self.typec_vbus.as_mut(),
            self.hub_power.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            line.release();
        }
        self.switch = None;
        self.typec_vbus = None;
        self.hub_power = None;
    }
}

fn drive(line: &mut ClaimedLine, level: Level, what: &str) -> StepOutcome {
    match line.set_direction_output(level) {
        Ok(()) => {
            info!("{}", what);
            StepOutcome::Written
        }
        Err(e) => {
            warn!("Failed to apply {}: {}", what, e);
            StepOutcome::Failed
        }
    }
}

impl Drop for RoleContext {
    fn drop(&mut self) {
        self.release_lines();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cable::CableNotifier;
    use crate::gpio::sim::{SimEvent, SimulatedGpio};
    use crate::gpio::{LineId, LineManager};

    fn hub() -> LineId {
        LineId::new("gpiochip0", 1)
    }
    fn vbus() -> LineId {
        LineId::new("gpiochip0", 2)
    }
    fn sw() -> LineId {
        LineId::new("gpiochip0", 3)
    }

    fn context(
        active: ActiveLevel,
        with_switch: bool,
    ) -> (SimulatedGpio, LineManager, RoleContext) {
        let sim = SimulatedGpio::with_lines([&hub(), &vbus(), &sw()]);
        let manager = LineManager::new(Arc::new(sim.clone()));
        let switch = with_switch.then(|| manager.claim(&sw(), "test").unwrap());
        let ctx = RoleContext::new(
            Some(manager.claim(&hub(), "test").unwrap()),
            Some(manager.claim(&vbus(), "test").unwrap()),
            active,
            switch,
            Arc::new(CableNotifier::new("test")),
        );
        sim.take_events();
        (sim, manager, ctx)
    }

    #[test]
    fn test_hub_power_idempotent() {
        let (sim, _manager, mut ctx) = context(ActiveLevel::High, true);

        assert_eq!(ctx.set_hub_power(PowerState::On), StepOutcome::Written);
        assert_eq!(ctx.set_hub_power(PowerState::On), StepOutcome::Unchanged);
        assert_eq!(sim.write_count(), 1);
        assert_eq!(sim.level(&hub()), Some(Level::High));
    }

    #[test]
    fn test_typec_vbus_active_low() {
        let (sim, _manager, mut ctx) = context(ActiveLevel::Low, true);

        // Lines start low, which is "on" for an active-low rail
        assert_eq!(ctx.set_typec_vbus(PowerState::On), StepOutcome::Unchanged);
        assert_eq!(ctx.set_typec_vbus(PowerState::Off), StepOutcome::Written);
        assert_eq!(sim.level(&vbus()), Some(Level::High));
    }

    #[test]
    fn test_switch_positions() {
        let (sim, _manager, mut ctx) = context(ActiveLevel::High, true);

        assert_eq!(ctx.set_switch(SwitchPosition::TypeC), StepOutcome::Unchanged);
        assert_eq!(ctx.set_switch(SwitchPosition::Hub), StepOutcome::Written);
        assert_eq!(ctx.set_switch(SwitchPosition::Hub), StepOutcome::Unchanged);
        assert_eq!(sim.events(), vec![SimEvent::Output(sw(), Level::High)]);
    }

    #[test]
    fn test_absent_switch_skipped() {
        let (sim, _manager, mut ctx) = context(ActiveLevel::High, false);
        assert_eq!(ctx.set_switch(SwitchPosition::Hub), StepOutcome::Absent);
        assert_eq!(sim.write_count(), 0);
    }

    #[test]
    fn test_write_failure_is_soft() {
        let (sim, _manager, mut ctx) = context(ActiveLevel::High, true);
        sim.fail_write(&vbus());

        assert_eq!(ctx.set_typec_vbus(PowerState::On), StepOutcome::Failed);
        assert_eq!(sim.level(&vbus()), Some(Level::Low));
    }

    #[test]
    fn test_release_lines_order() {
        let (sim, manager, mut ctx) = context(ActiveLevel::High, true);
        ctx.release_lines();
        ctx.release_lines();

        assert_eq!(manager.claimed_count(), 0);
        assert_eq!(
            sim.events(),
            vec![
                SimEvent::Release(sw()),
                SimEvent::Release(vbus()),
                SimEvent::Release(hub()),
            ]
        );
    }
}
