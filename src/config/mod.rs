//! Configuration loading
//!
//! The controller is configured from a TOML file. Missing fields fall back to
//! defaults; mandatory hardware fields are checked at initialization time.

mod schema;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use schema::{ActiveLevel, LineId, PlatformVariant, SwitchFailurePolicy, UsbRoleConfig};

use crate::error::Result;

/// Environment variable naming the default config file
pub const CONFIG_ENV: &str = "USB_ROLE_CONFIG";

/// Fallback config path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/usb-role-switch/config.toml";

impl UsbRoleConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: UsbRoleConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// Resolve the config path (environment variable takes precedence)
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            name = "board-usb"
            typec_vbus_active_level = "low"

            [typec_vbus]
            chip = "gpiochip2"
            offset = 1
            "#
        )
        .unwrap();

        let config = UsbRoleConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "board-usb");
        assert_eq!(config.typec_vbus_active_level, Some(ActiveLevel::Low));
        assert_eq!(config.typec_vbus, Some(LineId::new("gpiochip2", 1)));
        assert!(config.hub_power.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = UsbRoleConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = UsbRoleConfig::from_toml("variant = 3").unwrap_err();
        assert!(matches!(err, AppError::ConfigParse(_)));
    }

    #[test]
    fn test_validation_applied() {
        let err = UsbRoleConfig::from_toml("consumer = \"\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
