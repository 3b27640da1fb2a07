//! One engine shared between application code and the timer interrupt.
//!
//! [`SharedSerial`] keeps a [`SoftSerial`] behind a critical-section mutex so it can live in
//! a `static`. Every call takes the lock for one non-blocking step and releases it again;
//! the blocking writers retry from outside the lock, which lets the interrupt handler drain
//! the TX queue in between.
//!
//! ```ignore
//! static SERIAL: SharedSerial<Tim2, Pins<Pa0, Pa1>> = SharedSerial::new();
//!
//! #[interrupt]
//! fn TIM2() {
//!     SERIAL.on_timer_event().ok();
//! }
//!
//! fn main() {
//!     SERIAL.install(SoftSerial::initialize(timer, pins, &Config::default()).unwrap());
//!     SERIAL.write(b"Hello, World!\r\n").unwrap();
//! }
//! ```

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use embedded_hal::blocking;
use embedded_hal::serial;
use nb::block;

use crate::hal::{CaptureCompareTimer, SerialPins};
use crate::rx::Stats;
use crate::serial::{Error, SoftSerial};

pub struct SharedSerial<T, P, const TX: usize = 128, const RX: usize = 128>
where
	T: CaptureCompareTimer,
	P: SerialPins,
{
	inner: Mutex<RefCell<Option<SoftSerial<T, P, TX, RX>>>>,
}

impl<T, P, E, const TX: usize, const RX: usize> SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	/// An empty slot; writes fail with [`Error::NotInstalled`] until [`install`](Self::install).
	pub const fn new() -> Self {
		SharedSerial {
			inner: Mutex::new(RefCell::new(None)),
		}
	}

	/// Puts `serial` in the slot and returns whatever was there before.
	pub fn install(&self, serial: SoftSerial<T, P, TX, RX>) -> Option<SoftSerial<T, P, TX, RX>> {
		critical_section::with(|cs| self.inner.borrow(cs).replace(Some(serial)))
	}

	/// Empties the slot, e.g. to [`destroy`](SoftSerial::destroy) the engine.
	pub fn take(&self) -> Option<SoftSerial<T, P, TX, RX>> {
		critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().take())
	}

	/// Runs `f` on the engine inside one critical section.
	///
	/// `f` must not block: the timer interrupt is held off until it returns.
	pub fn with<R>(&self, f: impl FnOnce(&mut SoftSerial<T, P, TX, RX>) -> R) -> Option<R> {
		critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().as_mut().map(f))
	}

	pub fn try_write(&self, byte: u8) -> nb::Result<(), Error<E>> {
		self.with(|serial| serial.try_write(byte))
			.unwrap_or(Err(nb::Error::Other(Error::NotInstalled)))
	}

	/// Queues `byte`, spinning while the TX queue is full.
	///
	/// There is no timeout: if the timer interrupt never runs this never returns.
	pub fn write_byte(&self, byte: u8) -> Result<(), Error<E>> { block!(self.try_write(byte)) }

	pub fn write(&self, bytes: &[u8]) -> Result<(), Error<E>> {
		for byte in bytes {
			self.write_byte(*byte)?;
		}
		Ok(())
	}

	pub fn try_flush(&self) -> nb::Result<(), Error<E>> {
		self.with(|engine| serial::Write::flush(engine))
			.unwrap_or(Err(nb::Error::Other(Error::NotInstalled)))
	}

	/// Spins until the last queued stop bit has started.
	pub fn flush(&self) -> Result<(), Error<E>> { block!(self.try_flush()) }

	pub fn read_byte(&self) -> Option<u8> { self.with(|serial| serial.read_byte()).flatten() }

	pub fn bytes_available(&self) -> usize { self.with(|serial| serial.bytes_available()).unwrap_or(0) }

	pub fn is_transmitting(&self) -> bool { self.with(|serial| serial.is_transmitting()).unwrap_or(false) }

	pub fn stats(&self) -> Stats { self.with(|serial| serial.stats()).unwrap_or_default() }

	/// Timer interrupt entry point. Nothing to do while the slot is empty.
	pub fn on_timer_event(&self) -> Result<(), Error<E>> {
		self.with(|serial| serial.on_timer_event()).unwrap_or(Ok(()))
	}
}

impl<T, P, E, const TX: usize, const RX: usize> Default for SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	fn default() -> Self { Self::new() }
}

impl<'a, T, P, E, const TX: usize, const RX: usize> serial::Write<u8> for &'a SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	type Error = Error<E>;

	fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> { (**self).try_write(byte) }

	fn flush(&mut self) -> nb::Result<(), Self::Error> { (**self).try_flush() }
}

impl<'a, T, P, E, const TX: usize, const RX: usize> serial::Read<u8> for &'a SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	type Error = Error<E>;

	fn read(&mut self) -> nb::Result<u8, Self::Error> {
		match self.with(|serial| serial.read_byte()) {
			Some(Some(byte)) => Ok(byte),
			Some(None) => Err(nb::Error::WouldBlock),
			None => Err(nb::Error::Other(Error::NotInstalled)),
		}
	}
}

impl<'a, T, P, E, const TX: usize, const RX: usize> blocking::serial::write::Default<u8>
	for &'a SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
}

impl<'a, T, P, E, const TX: usize, const RX: usize> fmt::Write for &'a SharedSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	fn write_str(&mut self, s: &str) -> fmt::Result {
		(**self).write(s.as_bytes()).map_err(|_| fmt::Error)
	}
}
