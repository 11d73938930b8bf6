#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! pico_odometer - Power-loss tolerant odometer for Raspberry Pi Pico W/2W
//!
//! This library keeps a vehicle's cumulative distance in non-volatile storage,
//! survives power loss at any instant, and limits Flash wear with debounced
//! writes.

// Platform abstraction layer (Flash access, mock Flash for host tests)
pub mod platform;

// Core systems (logging, time and shared-state traits)
pub mod core;

// Key-value storage backends
pub mod storage;

// Distance ledger
pub mod odometer;
