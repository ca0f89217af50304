//! Role switch registration
//!
//! External controllers (a Type-C port manager, or an operator through the
//! userspace path) look switches up by name and drive them through the
//! [`RoleSwitch`] callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::types::Role;
use crate::error::{AppError, Result};

/// Callbacks exposed by a role switch provider
pub trait RoleSwitch: Send + Sync {
    /// Apply a role; blocks until the transition completes
    fn set_role(&self, role: Role) -> Result<()>;

    /// Role of the last completed transition
    fn get_role(&self) -> Role;
}

/// Registration descriptor
#[derive(Clone)]
pub struct RoleSwitchDesc {
    pub switch: Arc<dyn RoleSwitch>,
    /// Permit the role to be driven from the manual control path
    pub allow_userspace_control: bool,
}

/// Registry of role switches, keyed by name
#[derive(Clone, Default)]
pub struct RoleSwitchClass {
    switches: Arc<RwLock<HashMap<String, Arc<RoleSwitchDesc>>>>,
}

impl RoleSwitchClass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switch under `name`
    pub fn register(&self, name: &str, desc: RoleSwitchDesc) -> Result<RoleSwitchHandle> {
        if name.is_empty() {
            return Err(AppError::Config("Role switch name is empty".to_string()));
        }

        let desc = Arc::new(desc);
        let mut switches = self.switches.write();
        if switches.contains_key(name) {
            return Err(AppError::Registration(format!(
                "Role switch {} already registered",
                name
            )));
        }
        switches.insert(name.to_string(), Arc::clone(&desc));
        info!("Registered role switch {}", name);

        Ok(RoleSwitchHandle {
            name: name.to_string(),
            class: self.clone(),
            desc,
            registered: true,
        })
    }

    fn lookup(&self, name: &str) -> Result<Arc<RoleSwitchDesc>> {
        self.switches
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Role switch {}", name)))
    }

    /// Set the role of a named switch
    pub fn set_role(&self, name: &str, role: Role) -> Result<()> {
        // Lock is not held across the callback
        let desc = self.lookup(name)?;
        desc.switch.set_role(role)
    }

    /// Set the role through the manual (userspace) control path
    pub fn set_role_from_userspace(&self, name: &str, role: Role) -> Result<()> {
        let desc = self.lookup(name)?;
        if !desc.allow_userspace_control {
            return Err(AppError::PermissionDenied(format!(
                "Userspace control disabled for {}",
                name
            )));
        }
        desc.switch.set_role(role)
    }

    pub fn get_role(&self, name: &str) -> Result<Role> {
        Ok(self.lookup(name)?.switch.get_role())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.switches.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.switches.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn remove(&self, name: &str, desc: &Arc<RoleSwitchDesc>) {
        let mut switches = self.switches.write();
        if switches
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, desc))
        {
            switches.remove(name);
        }
    }
}

/// Registration token; unregisters on drop
pub struct RoleSwitchHandle {
    name: String,
    class: RoleSwitchClass,
    desc: Arc<RoleSwitchDesc>,
    registered: bool,
}

impl RoleSwitchHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn allows_userspace_control(&self) -> bool {
        self.desc.allow_userspace_control
    }

    pub fn set_role(&self, role: Role) -> Result<()> {
        self.desc.switch.set_role(role)
    }

    pub fn role(&self) -> Role {
        self.desc.switch.get_role()
    }

    /// Unregister; calling twice is a no-op
    pub fn unregister(&mut self) {
        if self.registered {
            self.class.remove(&self.name, &self.desc);
            self.registered = false;
            debug!("Unregistered role switch {}", self.name);
        }
    }
}

impl Drop for RoleSwitchHandle {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FixedSwitch {
        role: Mutex<Role>,
    }

    impl RoleSwitch for FixedSwitch {
        fn set_role(&self, role: Role) -> Result<()> {
            *self.role.lock() = role;
            Ok(())
        }

        fn get_role(&self) -> Role {
            *self.role.lock()
        }
    }

    fn desc(allow: bool) -> RoleSwitchDesc {
        RoleSwitchDesc {
            switch: Arc::new(FixedSwitch::default()),
            allow_userspace_control: allow,
        }
    }

    #[test]
    fn test_register_and_dispatch() {
        let class = RoleSwitchClass::new();
        let handle = class.register("hikey", desc(true)).unwrap();

        class.set_role("hikey", Role::Device).unwrap();
        assert_eq!(class.get_role("hikey").unwrap(), Role::Device);
        assert_eq!(handle.role(), Role::Device);
        assert_eq!(class.names(), vec!["hikey".to_string()]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let class = RoleSwitchClass::new();
        let _handle = class.register("hikey", desc(true)).unwrap();
        let err = class.register("hikey", desc(true)).err().unwrap();
        assert!(matches!(err, AppError::Registration(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        let class = RoleSwitchClass::new();
        assert!(matches!(
            class.register("", desc(true)).err().unwrap(),
            AppError::Config(_)
        ));
    }

    #[test]
    fn test_unregister_on_drop() {
        let class = RoleSwitchClass::new();
        {
            let _handle = class.register("hikey", desc(true)).unwrap();
            assert!(class.is_registered("hikey"));
        }
        assert!(!class.is_registered("hikey"));
        assert!(matches!(
            class.set_role("hikey", Role::Host).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_unregister_idempotent() {
        let class = RoleSwitchClass::new();
        let mut handle = class.register("hikey", desc(true)).unwrap();
        handle.unregister();
        handle.unregister();
        assert!(!handle.is_registered());

        // A new registration under the same name survives the old handle
        let _second = class.register("hikey", desc(true)).unwrap();
        drop(handle);
        assert!(class.is_registered("hikey"));
    }

    #[test]
    fn test_userspace_control_flag() {
        let class = RoleSwitchClass::new();
        let _locked = class.register("locked", desc(false)).unwrap();
        let _open = class.register("open", desc(true)).unwrap();

        let err = class
            .set_role_from_userspace("locked", Role::Host)
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(class.get_role("locked").unwrap(), Role::None);

        class.set_role_from_userspace("open", Role::Host).unwrap();
        assert_eq!(class.get_role("open").unwrap(), Role::Host);
    }
}
