//! USB role controller lifecycle
//!
//! Acquires the GPIO lines, the cable sink and the role switch registration
//! in dependency order. Every acquired resource is held by a guard, so a
//! failure part way through unwinds exactly what was acquired so far.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::actuator::RoleContext;
use super::machine::ContextRoleSwitch;
use super::switch::{RoleSwitchClass, RoleSwitchDesc, RoleSwitchHandle};
use super::types::{ActiveLevel, PowerState, Role, SwitchPosition, TransitionReport};
use crate::cable::{CableKind, CableSink};
use crate::config::{SwitchFailurePolicy, UsbRoleConfig};
use crate::error::{AppError, Result};
use crate::gpio::{ClaimedLine, Level, LineManager};

/// Cable kinds announced by the controller
pub const SUPPORTED_CABLES: [CableKind; 2] = [CableKind::Usb, CableKind::UsbHost];

/// Cable sink registration, undone on drop
struct CableRegistration {
    sink: Arc<dyn CableSink>,
    active: bool,
}

impl CableRegistration {
    fn register(sink: Arc<dyn CableSink>) -> Result<Self> {
        sink.register(&SUPPORTED_CABLES)?;
        Ok(Self { sink, active: true })
    }

    fn release(&mut self) {
        if self.active {
            self.sink.unregister();
            self.active = false;
        }
    }
}

impl Drop for CableRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

/// State of one line for status reports
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineStatus {
    pub line: Option<String>,
    pub level: Option<Level>,
}

impl LineStatus {
    fn of(line: Option<&ClaimedLine>) -> Self {
        Self {
            line: line.map(|l| l.id().to_string()),
            level: line.and_then(|l| l.current_level()),
        }
    }
}

/// Snapshot of the controller state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoleSwitchStatus {
    pub name: String,
    pub role: Role,
    pub registered: bool,
    pub typec_vbus_active_level: ActiveLevel,
    pub hub_power: LineStatus,
    pub typec_vbus: LineStatus,
    pub switch: LineStatus,
    pub usb: Option<bool>,
    pub usb_host: Option<bool>,
}

/// USB role controller
///
/// Owns the hardware context and its role switch registration.
pub struct UsbRoleController {
    name: String,
    context: Arc<Mutex<RoleContext>>,
    cable: Option<CableRegistration>,
    role_switch: Option<RoleSwitchHandle>,
}

impl UsbRoleController {
    /// Acquire all resources and register the role switch
    pub fn initialize(
        config: &UsbRoleConfig,
        lines: &LineManager,
        cable: Arc<dyn CableSink>,
        class: &RoleSwitchClass,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing USB role switch {} ({}) via {}",
            config.name,
            config.variant,
            lines.provider_name()
        );

        // Hub power
        let hub_power = match &config.hub_power {
            Some(id) => {
                let mut line = lines.claim(id, &config.consumer).map_err(|e| {
                    error!("request hub power line err: {}", e);
                    e
                })?;
                line.set_direction_output(Level::High).map_err(|e| {
                    error!("power on hub vbus err: {}", e);
                    AppError::unavailable(id, e)
                })?;
                Some(line)
            }
            None => {
                info!("No hub power line configured");
                None
            }
        };

        // Type-C VBUS, starts at the inactive level
        let vbus_id = config.typec_vbus.as_ref().ok_or_else(|| {
            error!("typec vbus line is not configured");
            AppError::ConfigurationMissing("typec_vbus".to_string())
        })?;
        let mut typec_vbus = lines.claim(vbus_id, &config.consumer).map_err(|e| {
            error!("request typec vbus line err: {}", e);
            e
        })?;
        let active = config.typec_vbus_active_level.ok_or_else(|| {
            error!("typec vbus active level can't get");
            AppError::ConfigurationMissing("typec_vbus_active_level".to_string())
        })?;
        typec_vbus
            .set_direction_output(active.level_for(PowerState::Off))
            .map_err(|e| {
                error!("set up typec vbus err: {}", e);
                AppError::unavailable(vbus_id, e)
            })?;

        // Data switch
        let switch = if config.variant.requires_switch() {
            match Self::claim_switch(config, lines) {
                Ok(line) => Some(line),
                Err(e) if config.switch_failure_policy == SwitchFailurePolicy::Continue => {
                    warn!("Continuing without otg switch line: {}", e);
                    None
                }
                Err(e) => {
                    error!("otg switch line setup err: {}", e);
                    return Err(e);
                }
            }
        } else {
            if config.switch.is_some() {
                debug!("Switch line ignored for {}", config.variant);
            }
            None
        };

        let context = Arc::new(Mutex::new(RoleContext::new(
            hub_power,
            Some(typec_vbus),
            active,
            switch,
            Arc::clone(&cable),
        )));

        let registration = CableRegistration::register(Arc::clone(&cable)).map_err(|e| {
            error!("failed to register cable sink: {}", e);
            e
        })?;
        cable.set_state(CableKind::UsbHost, true);

        let role_switch = class
            .register(
                &config.name,
                RoleSwitchDesc {
                    switch: Arc::new(ContextRoleSwitch::new(Arc::clone(&context))),
                    allow_userspace_control: config.allow_userspace_control,
                },
            )
            .map_err(|e| {
                error!("failed to register role switch: {}", e);
                e
            })?;

        info!("USB role switch {} initialized", config.name);
        Ok(Self {
            name: config.name.clone(),
            context,
            cable: Some(registration),
            role_switch: Some(role_switch),
        })
    }

    fn claim_switch(config: &UsbRoleConfig, lines: &LineManager) -> Result<ClaimedLine> {
        let id = config
            .switch
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationMissing("switch".to_string()))?;
        let mut line = lines.claim(id, &config.consumer)?;
        line.set_direction_output(SwitchPosition::Hub.level())
            .map_err(|e| AppError::unavailable(id, e))?;
        Ok(line)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.role_switch
            .as_ref()
            .is_some_and(|handle| handle.is_registered())
    }

    /// Apply a role through the registered switch
    pub fn set_role(&self, role: Role) -> Result<()> {
        match &self.role_switch {
            Some(handle) => handle.set_role(role),
            None => Err(AppError::NotFound(format!(
                "Role switch {} torn down",
                self.name
            ))),
        }
    }

    pub fn get_role(&self) -> Role {
        match &self.role_switch {
            Some(handle) => handle.role(),
            None => self.context.lock().role(),
        }
    }

    /// Apply a role directly and return the per-step outcome
    pub fn transition(&self, role: Role) -> TransitionReport {
        self.context.lock().apply(role)
    }

    pub fn status(&self) -> RoleSwitchStatus {
        let ctx = self.context.lock();
        RoleSwitchStatus {
            name: self.name.clone(),
            role: ctx.role(),
            registered: self.is_active(),
            typec_vbus_active_level: ctx.typec_vbus_active(),
            hub_power: LineStatus::of(ctx.hub_power_line()),
            typec_vbus: LineStatus::of(ctx.typec_vbus_line()),
            switch: LineStatus::of(ctx.switch_line()),
            usb: ctx.cable.state(CableKind::Usb),
            usb_host: ctx.cable.state(CableKind::UsbHost),
        }
    }

    /// Release all resources
    pub fn teardown(mut self) {
        self.release_all();
        info!("USB role switch {} torn down", self.name);
    }

    fn release_all(&mut self) {
        self.context.lock().release_lines();
        if let Some(mut handle) = self.role_switch.take() {
            handle.unregister();
        }
        if let Some(mut registration) = self.cable.take() {
            registration.release();
        }
    }
}

impl Drop for UsbRoleController {
    fn drop(&mut self) {
        self.release_all();
    }
}
