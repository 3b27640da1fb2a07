//! Full-duplex serial over one timer.
//!
//! [`SoftSerial`] owns the timer, the pins and both byte queues. Everything on it is
//! non-blocking: the application queues and dequeues bytes, the platform calls
//! [`SoftSerial::on_timer_event`] from the timer's interrupt handler. Both paths take
//! `&mut self`; [`SharedSerial`](crate::SharedSerial) puts the engine behind a
//! critical-section mutex and adds the blocking writers on top.

use embedded_hal::serial;

use crate::hal::{CaptureCompareTimer, Event, Level, SerialPins};
use crate::queue::ByteQueue;
use crate::rx::{Receiver, Stats};
use crate::timing::{BaudTiming, Config, InvalidBaudRate};
use crate::tx::Transmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
	/// The baud rate does not fit the timer's counting range
	InvalidBaudRate,
	/// The RX pin could not be read
	Bus(E),
	/// A [`SharedSerial`](crate::SharedSerial) was used before an engine was installed
	NotInstalled,
}

impl<E> From<InvalidBaudRate> for Error<E> {
	fn from(_: InvalidBaudRate) -> Self { Error::InvalidBaudRate }
}

/// Software UART: 8 data bits, no parity, 1 stop bit.
///
/// `TX` and `RX` are the queue capacities (16, 32, 64 or 128). A byte being shifted out
/// still occupies its TX slot until its stop bit starts.
pub struct SoftSerial<T, P, const TX: usize = 128, const RX: usize = 128>
where
	T: CaptureCompareTimer,
	P: SerialPins,
{
	timer: T,
	pins: P,
	timing: BaudTiming,
	tx_queue: ByteQueue<TX>,
	rx_queue: ByteQueue<RX>,
	transmitter: Transmitter,
	receiver: Receiver,
}

impl<T, P, E, const TX: usize, const RX: usize> SoftSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	/// Derives the timing from `config` and sets up the hardware.
	///
	/// Fails with [`Error::InvalidBaudRate`] before touching the timer.
	pub fn initialize(timer: T, pins: P, config: &Config) -> Result<Self, Error<E>> {
		let timing = BaudTiming::from_config(config)?;
		#[cfg(feature = "defmt")]
		defmt::debug!(
			"soft serial {} baud: prescaler {}, {} ticks/bit",
			config.baudrate,
			timing.prescaler,
			timing.ticks_per_bit
		);
		Ok(Self::new(timer, pins, timing))
	}

	/// Configures pins and timer for `timing`, leaves the line idle high and arms
	/// start-edge detection.
	pub fn new(mut timer: T, mut pins: P, timing: BaudTiming) -> Self {
		pins.configure();

		timer.set_prescaler(timing.prescaler);
		timer.force_output(Level::High);
		timer.release_output();
		timer.disable(Event::BitTick);
		timer.disable(Event::SampleTick);
		timer.clear_pending(Event::BitTick);
		timer.clear_pending(Event::SampleTick);
		timer.clear_pending(Event::StartEdge);
		timer.capture_falling_edges();
		timer.enable(Event::StartEdge);
		timer.arm_capture();
		timer.unmask_interrupt();
		timer.start();

		SoftSerial {
			timer,
			pins,
			timing,
			tx_queue: ByteQueue::new(),
			rx_queue: ByteQueue::new(),
			transmitter: Transmitter::new(),
			receiver: Receiver::new(),
		}
	}

	/// Stops every event source and hands back the peripherals.
	pub fn destroy(mut self) -> (T, P) {
		self.timer.mask_interrupt();
		self.timer.disable(Event::StartEdge);
		self.timer.disable(Event::SampleTick);
		self.timer.disable(Event::BitTick);
		self.timer.disarm_capture();
		self.timer.force_output(Level::High);
		self.timer.release_output();
		(self.timer, self.pins)
	}

	pub fn timing(&self) -> &BaudTiming { &self.timing }

	/// Queues `byte`, or returns `WouldBlock` when the TX queue is full.
	///
	/// Bit ticks are held off while the queue is touched. If the transmitter is idle the
	/// byte starts going out right away.
	pub fn try_write(&mut self, byte: u8) -> nb::Result<(), Error<E>> {
		if self.tx_queue.is_full() {
			return Err(nb::Error::WouldBlock);
		}

		let ticking = self.timer.is_enabled(Event::BitTick);
		self.timer.disable(Event::BitTick);

		self.tx_queue.try_enqueue(byte);
		if !self.transmitter.is_active() {
			self.transmitter.prime(&mut self.timer, byte, &self.timing);
		}
		else if ticking {
			self.timer.enable(Event::BitTick);
		}
		Ok(())
	}

	/// Received bytes waiting to be read.
	pub fn bytes_available(&self) -> usize { self.rx_queue.len() }

	/// Oldest received byte.
	pub fn read_byte(&mut self) -> Option<u8> { self.rx_queue.dequeue() }

	/// A frame is being shifted out.
	pub fn is_transmitting(&self) -> bool { self.transmitter.is_active() }

	/// A start edge was accepted and its frame is still being sampled.
	pub fn is_receiving(&self) -> bool { self.receiver.is_receiving() }

	pub fn stats(&self) -> Stats { self.receiver.stats() }

	/// Timer interrupt entry point.
	///
	/// Services every pending source in one call: start edge, then RX sample, then TX bit.
	/// Must not be re-entered. A failed RX pin read abandons the frame being received and is
	/// returned after the TX side has been serviced.
	pub fn on_timer_event(&mut self) -> Result<(), Error<E>> {
		let mut received = Ok(());

		if self.timer.is_pending(Event::StartEdge) {
			let has_room = !self.rx_queue.is_full();
			received = self.receiver.on_start_edge(&mut self.timer, &self.pins, has_room, &self.timing);
		}

		if received.is_ok() && self.receiver.is_receiving() && self.timer.is_pending(Event::SampleTick) {
			received = self.receiver.on_sample_tick(
				&mut self.timer,
				&self.pins,
				&mut self.rx_queue,
				&self.timing,
			);
		}

		if self.transmitter.is_active() && self.timer.is_pending(Event::BitTick) {
			self.transmitter.on_bit_tick(&mut self.timer, &mut self.tx_queue, &self.timing);
		}

		received.map_err(Error::Bus)
	}
}

impl<T, P, E, const TX: usize, const RX: usize> serial::Write<u8> for SoftSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	type Error = Error<E>;

	fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> { self.try_write(byte) }

	/// Done once the stop bit of the last queued byte has started.
	///
	/// That is one bit period before the line is back to idle, so a caller that powers down
	/// or reconfigures the pin right after a successful flush must wait that long itself.
	fn flush(&mut self) -> nb::Result<(), Self::Error> {
		if self.transmitter.is_active() {
			Err(nb::Error::WouldBlock)
		}
		else {
			Ok(())
		}
	}
}

impl<T, P, E, const TX: usize, const RX: usize> serial::Read<u8> for SoftSerial<T, P, TX, RX>
where
	T: CaptureCompareTimer,
	P: SerialPins<Error = E>,
{
	type Error = Error<E>;

	fn read(&mut self) -> nb::Result<u8, Self::Error> { self.read_byte().ok_or(nb::Error::WouldBlock) }
}
