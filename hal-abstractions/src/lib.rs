//! Hardware abstraction traits for IoT firmware
//!
//! This crate defines the capability sets the motion tracker consumes from
//! its environment. BSPs implement these traits; `motion-core` is written
//! only against them so it runs unchanged on a host under test.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod network;
pub mod sensor;
pub mod storage;

pub use clock::Clock;
pub use network::{Publisher, Transport};
pub use sensor::{Axes, SensorDriver, WakeOnMotion};
pub use storage::DurableStore;
