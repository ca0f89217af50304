//! usb-role-switch - USB role switch controller
//!
//! This crate drives the hub power, Type-C VBUS and data-path switch lines of
//! boards that share one USB controller between an on-board hub and a
//! Type-C port, exposing the result as a USB role switch.

pub mod cable;
pub mod config;
pub mod error;
pub mod gpio;
pub mod role;

pub use error::{AppError, Result};
