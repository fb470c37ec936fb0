//! can-transport: cross-platform CAN bus abstractions
//!
//! This crate provides traits and types for interacting with Controller Area Network (CAN)
//! interfaces, with feature-gated backends. The default build enables a `mock` backend so
//! that binaries can compile and be tested on any host without native drivers.
//!
//! Every backend supports a non-blocking [`CanBus::try_recv`], which is what polling
//! control loops use to drain the receive queue without stalling their send cadence.

mod types;
pub use types::{BusInfo, CanFilter, CanFrame, CanId, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::CanBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockBus;

#[cfg(feature = "slcan")]
mod slcan;

#[cfg(feature = "slcan")]
pub use slcan::{SlcanBitrate, SlcanBus};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
mod socketcan_bus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan_bus::SocketCanBus;
