//! Cable-state notification
//!
//! An external-connector style sink announcing which USB cable kinds are
//! attached. Listeners subscribe to a broadcast channel and only see state
//! changes, matching the synchronous notify semantics of extcon.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Event channel capacity (ring buffer size)
const CABLE_CHANNEL_CAPACITY: usize = 64;

/// Cable kinds announced by the role switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableKind {
    /// Peripheral (device) connection
    Usb,
    /// Host connection
    UsbHost,
}

impl fmt::Display for CableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CableKind::Usb => write!(f, "USB"),
            CableKind::UsbHost => write!(f, "USB-HOST"),
        }
    }
}

/// Cable state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CableEvent {
    pub cable: CableKind,
    pub attached: bool,
}

/// Sink receiving cable-state announcements
pub trait CableSink: Send + Sync {
    /// Declare the supported cable kinds
    fn register(&self, cables: &[CableKind]) -> Result<()>;

    /// Drop the registration; no-op if not registered
    fn unregister(&self);

    /// Update a cable state without notifying listeners
    fn set_state(&self, cable: CableKind, attached: bool);

    /// Update a cable state and notify listeners if it changed
    fn set_state_sync(&self, cable: CableKind, attached: bool);

    /// Current state, `None` if the cable is not supported
    fn state(&self, cable: CableKind) -> Option<bool>;
}

/// Broadcast-backed cable sink
pub struct CableNotifier {
    name: String,
    states: Mutex<Option<BTreeMap<CableKind, bool>>>,
    tx: broadcast::Sender<CableEvent>,
}

impl CableNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = broadcast::channel(CABLE_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            states: Mutex::new(None),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_registered(&self) -> bool {
        self.states.lock().is_some()
    }

    /// Subscribe to cable state changes
    pub fn subscribe(&self) -> broadcast::Receiver<CableEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Store a new state, returning whether it changed
    fn update(&self, cable: CableKind, attached: bool) -> bool {
        let mut guard = self.states.lock();
        let Some(states) = guard.as_mut() else {
            warn!("{}: cable {} set before registration", self.name, cable);
            return false;
        };
        match states.get_mut(&cable) {
            Some(state) if *state == attached => false,
            Some(state) => {
                *state = attached;
                true
            }
            None => {
                warn!("{}: unsupported cable {}", self.name, cable);
                false
            }
        }
    }
}

impl CableSink for CableNotifier {
    fn register(&self, cables: &[CableKind]) -> Result<()> {
        if cables.is_empty() {
            return Err(AppError::Registration(format!(
                "{}: no cable kinds given",
                self.name
            )));
        }

        let mut guard = self.states.lock();
        if guard.is_some() {
            return Err(AppError::Registration(format!(
                "{}: cable sink already registered",
                self.name
            )));
        }
        *guard = Some(cables.iter().map(|cable| (*cable, false)).collect());
        debug!("{}: registered cables {:?}", self.name, cables);
        Ok(())
    }

    fn unregister(&self) {
        if self.states.lock().take().is_some() {
            debug!("{}: cable sink unregistered", self.name);
        }
    }

    fn set_state(&self, cable: CableKind, attached: bool) {
        self.update(cable, attached);
    }

    fn set_state_sync(&self, cable: CableKind, attached: bool) {
        if self.update(cable, attached) {
            debug!("{}: cable {} attached={}", self.name, cable, attached);
            // No subscribers is normal
            let _ = self.tx.send(CableEvent { cable, attached });
        }
    }

    fn state(&self, cable: CableKind) -> Option<bool> {
        self.states
            .lock()
            .as_ref()
            .and_then(|states| states.get(&cable).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_once() {
        let notifier = CableNotifier::new("test");
        notifier
            .register(&[CableKind::Usb, CableKind::UsbHost])
            .unwrap();
        assert!(notifier.is_registered());
        assert_eq!(notifier.state(CableKind::Usb), Some(false));

        let err = notifier.register(&[CableKind::Usb]).unwrap_err();
        assert!(matches!(err, AppError::Registration(_)));

        notifier.unregister();
        assert!(!notifier.is_registered());
        assert_eq!(notifier.state(CableKind::Usb), None);
    }

    #[test]
    fn test_register_empty_rejected() {
        let notifier = CableNotifier::new("test");
        assert!(notifier.register(&[]).is_err());
    }

    #[test]
    fn test_unsupported_cable_ignored() {
        let notifier = CableNotifier::new("test");
        notifier.register(&[CableKind::UsbHost]).unwrap();
        notifier.set_state_sync(CableKind::Usb, true);
        assert_eq!(notifier.state(CableKind::Usb), None);
    }

    #[tokio::test]
    async fn test_sync_notifies_on_change_only() {
        let notifier = CableNotifier::new("test");
        notifier
            .register(&[CableKind::Usb, CableKind::UsbHost])
            .unwrap();
        let mut rx = notifier.subscribe();

        // Silent update
        notifier.set_state(CableKind::UsbHost, true);
        // Unchanged, no event
        notifier.set_state_sync(CableKind::UsbHost, true);
        notifier.set_state_sync(CableKind::Usb, true);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CableEvent {
                cable: CableKind::Usb,
                attached: true
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cable_display() {
        assert_eq!(CableKind::Usb.to_string(), "USB");
        assert_eq!(CableKind::UsbHost.to_string(), "USB-HOST");
    }
}
