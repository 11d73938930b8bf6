//! Platform abstraction traits
//!
//! Storage backends are written against these traits so the same code runs
//! on the RP2350 Flash driver and on the host mock.

pub mod flash;

pub use flash::FlashInterface;
