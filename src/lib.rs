//! A full-duplex software UART built on one general-purpose timer instead of a UART
//! peripheral.
//!
//! One output-compare channel shifts TX bits out, one input-capture channel catches the
//! falling edge of an incoming start bit, and one more compare channel samples the RX pin in
//! the middle of every bit. The timer is reached through the [`hal::CaptureCompareTimer`]
//! trait, so the bit engine itself knows nothing about registers.
//!
//! Frames are fixed at 8 data bits, no parity, 1 stop bit.
//!
//! [`SoftSerial`] is the non-blocking engine and implements the [`embedded-hal`] serial
//! traits. [`SharedSerial`] wraps it in a critical-section mutex for use from a `static`
//! shared with the timer interrupt, and adds the blocking writers and `core::fmt::Write`.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal

#![cfg_attr(not(test), no_std)]

pub mod hal;
pub mod queue;
pub mod serial;
pub mod shared;
pub mod timing;

mod rx;
mod tx;

pub use crate::hal::{CaptureCompareTimer, Event, Level, Pins, SerialPins};
pub use crate::rx::Stats;
pub use crate::serial::{Error, SoftSerial};
pub use crate::shared::SharedSerial;
pub use crate::timing::{BaudTiming, Config, InvalidBaudRate, MAX_PRESCALER, MAX_TICKS_PER_BIT};
