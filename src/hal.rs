//! Interfaces the engine needs from the timer and the GPIO block.
//!
//! The engine never touches registers. A target implements [`CaptureCompareTimer`] once
//! over its own timer peripheral and hands the engine a [`SerialPins`] pair.

use embedded_hal::digital::v2::InputPin;

/// Timer event sources used by the engine, one per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
	/// Input capture on the RX pin (falling edge of a start bit)
	StartEdge,
	/// Compare match used to sample RX bits
	SampleTick,
	/// Compare match on the channel that drives TX
	BitTick,
}

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
	Low,
	High,
}

impl From<bool> for Level {
	fn from(high: bool) -> Self {
		if high {
			Level::High
		}
		else {
			Level::Low
		}
	}
}

/// One 16-bit timer with an output-compare channel (TX), an input-capture channel (RX edge)
/// and a plain compare channel (RX sampling), all sharing one interrupt line.
pub trait CaptureCompareTimer {
	/// Sets the clock divisor (the register usually holds `prescaler - 1`).
	fn set_prescaler(&mut self, prescaler: u32);

	/// Starts the counter.
	fn start(&mut self);

	/// Current counter value.
	fn now(&self) -> u16;

	/// Sets the compare register of `event`'s channel to an absolute count.
	fn schedule(&mut self, event: Event, at: u16);

	/// Current compare register of `event`'s channel.
	fn compare(&self, event: Event) -> u16;

	/// Count latched by the last input capture.
	fn captured(&self) -> u16;

	fn is_pending(&self, event: Event) -> bool;

	fn clear_pending(&mut self, event: Event);

	/// Lets `event` raise the timer interrupt.
	fn enable(&mut self, event: Event);

	fn disable(&mut self, event: Event);

	fn is_enabled(&self, event: Event) -> bool;

	/// The TX channel drives `level` at its next compare match and holds it.
	fn set_output_on_match(&mut self, level: Level);

	/// The TX channel drives `level` now and ignores compare matches.
	fn force_output(&mut self, level: Level);

	/// Routes the TX channel's level to its pin.
	fn connect_output(&mut self);

	/// Detaches the TX channel from its pin; the line falls back to its idle (high) state.
	fn release_output(&mut self);

	/// Makes the capture channel trigger on falling edges of the RX pin.
	fn capture_falling_edges(&mut self);

	/// Enables latching on the capture channel.
	fn arm_capture(&mut self);

	fn disarm_capture(&mut self);

	/// Unmasks the timer's interrupt line.
	fn unmask_interrupt(&mut self);

	fn mask_interrupt(&mut self);
}

/// TX/RX pins routed to the timer channels.
pub trait SerialPins {
	type Error;

	/// Selects alternate-function mode: TX on the compare output, RX on the capture input
	/// with a pull-up.
	fn configure(&mut self) {}

	/// Reads the RX line.
	fn rx_is_high(&self) -> Result<bool, Self::Error>;
}

/// Pins already put in alternate-function mode by the HAL.
///
/// `TX` is only held so nothing else can claim the pin while the timer drives it.
pub struct Pins<TX, RX> {
	pub tx: TX,
	pub rx: RX,
}

impl<TX, RX> Pins<TX, RX>
where
	RX: InputPin,
{
	pub fn new(tx: TX, rx: RX) -> Self { Pins { tx, rx } }
}

impl<TX, RX, E> SerialPins for Pins<TX, RX>
where
	RX: InputPin<Error = E>,
{
	type Error = E;

	fn rx_is_high(&self) -> Result<bool, E> { self.rx.is_high() }
}
