//! Application core: domain logic behind port traits.
//!
//! This module contains the control plane of the tracker: the event
//! consumer, its outbound events and the ports it drives.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
