//! Asset tracker control plane.
//!
//! Exposes the event-driven core for integration testing and for the
//! firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod fota;
pub mod fsm;
pub mod mirror;
pub mod scheduler;

// Host builds get simulated adapters; the real ones are behind cfg.
pub mod adapters;
