//! PulseMeter daemon internals
//!
//! Everything the `pulsemeter` binary wires together, exposed as a
//! library so the task loops can be driven deterministically from
//! integration tests with scripted sources and paused time.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod publisher;
pub mod source;
pub mod tasks;

#[cfg(feature = "rpi")]
pub mod hardware;
