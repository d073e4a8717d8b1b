//! Hardware monitoring message router
//!
//! Receives sensor and actuator requests, turns enclosure events into normalized
//! alerts, drives service actuators and forwards every response to the egress
//! publisher. See [`router::Router`] for the assembled system.

pub mod actors;
pub mod actuators;
pub mod alerts;
pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod ingress;
pub mod lifecycle;
pub mod router;
pub mod util;
