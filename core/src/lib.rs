//! Platform-agnostic core logic for the motion tracker firmware
//!
//! This crate contains the sample ring, the per-minute activity digest and
//! the lifecycle state machine that wires them to sensor interrupts and soft
//! timers. It has NO hardware dependencies: every collaborator is reached
//! through a `hal-abstractions` trait, so the whole crate runs on a host
//! under `cargo test`.
//!
//! ## Execution contexts
//!
//! - **Interrupt context**: [`SampleRing::push`] and
//!   [`ActivityDigest::record_activity`]. Both are O(1) and take a short
//!   critical section around their index updates.
//! - **Task context**: [`SampleRing::drain`] and
//!   [`ActivityDigest::publish_backlog`]. Both await transport I/O outside
//!   any critical section and only ever block for bounded, configured
//!   timeouts.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod calendar;
pub mod config;
pub mod digest;
pub mod error;
pub mod orchestrator;
pub mod persist;
pub mod record;
pub mod ring;
pub mod sample;
pub mod timer;
pub mod tunables;
pub mod uploader;

#[cfg(test)]
mod testing;

pub use config::{DigestConfig, TrackerConfig};
pub use digest::ActivityDigest;
pub use error::Error;
pub use orchestrator::{Directive, Event, LifecycleState, Orchestrator, SleepRequest, TimerKind};
pub use ring::SampleRing;
pub use sample::{MotionSample, Origin};
pub use tunables::Tunable;
pub use uploader::{SampleUploader, UploadStats};
