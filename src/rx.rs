//! Start-edge detection and mid-bit sampling.
//!
//! The capture channel and the sampling channel are never live at the same time: a
//! qualifying falling edge disarms capture and starts sample ticks, and the stop-bit
//! sample does the reverse.

use crate::hal::{CaptureCompareTimer, Event, SerialPins};
use crate::queue::ByteQueue;
use crate::timing::BaudTiming;

/// Sample ticks before the stop bit.
const DATA_BITS: u8 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RxFrame {
	accumulator: u8,
	bit_count: u8,
}

/// Receive-side error counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
	/// Frames dropped because the stop bit read low
	pub framing_errors: u32,
	/// Well-formed bytes dropped because the RX queue was full when their start edge arrived
	pub overruns: u32,
}

#[derive(Debug)]
pub(crate) struct Receiver {
	frame: RxFrame,
	receiving: bool,
	has_room: bool,
	stats: Stats,
}

impl Receiver {
	pub(crate) const fn new() -> Self {
		Receiver {
			frame: RxFrame {
				accumulator: 0,
				bit_count: 0,
			},
			receiving: false,
			has_room: false,
			stats: Stats {
				framing_errors: 0,
				overruns: 0,
			},
		}
	}

	pub(crate) fn is_receiving(&self) -> bool { self.receiving }

	pub(crate) fn stats(&self) -> Stats { self.stats }

	/// Handles a capture on the RX pin. `has_room` is the RX queue state at this instant and
	/// decides the fate of the whole frame.
	pub(crate) fn on_start_edge<T, P>(
		&mut self,
		timer: &mut T,
		pins: &P,
		has_room: bool,
		timing: &BaudTiming,
	) -> Result<(), P::Error>
	where
		T: CaptureCompareTimer,
		P: SerialPins,
	{
		timer.clear_pending(Event::StartEdge);
		let edge_at = timer.captured();
		if self.receiving || pins.rx_is_high()? {
			return Ok(());
		}

		timer.schedule(Event::SampleTick, edge_at.wrapping_add(timing.one_and_half_bit_ticks));
		timer.clear_pending(Event::SampleTick);
		self.has_room = has_room;
		self.receiving = true;
		timer.enable(Event::SampleTick);
		timer.disarm_capture();
		timer.disable(Event::StartEdge);

		#[cfg(feature = "defmt")]
		defmt::trace!("start edge at {}", edge_at);
		Ok(())
	}

	pub(crate) fn on_sample_tick<T, P, const N: usize>(
		&mut self,
		timer: &mut T,
		pins: &P,
		queue: &mut ByteQueue<N>,
		timing: &BaudTiming,
	) -> Result<(), P::Error>
	where
		T: CaptureCompareTimer,
		P: SerialPins,
	{
		timer.clear_pending(Event::SampleTick);
		let next = timer.compare(Event::SampleTick).wrapping_add(timing.ticks_per_bit);
		timer.schedule(Event::SampleTick, next);

		let high = match pins.rx_is_high() {
			Ok(high) => high,
			Err(e) => {
				self.finish(timer);
				return Err(e);
			}
		};

		if self.frame.bit_count < DATA_BITS {
			self.frame.accumulator |= u8::from(high) << self.frame.bit_count;
			self.frame.bit_count += 1;
			return Ok(());
		}

		let byte = self.frame.accumulator;
		if !high {
			self.stats.framing_errors = self.stats.framing_errors.wrapping_add(1);
			#[cfg(feature = "defmt")]
			defmt::warn!("framing error, dropped {=u8:#x}", byte);
		}
		else if !(self.has_room && queue.try_enqueue(byte)) {
			self.stats.overruns = self.stats.overruns.wrapping_add(1);
			#[cfg(feature = "defmt")]
			defmt::warn!("rx queue full, dropped {=u8:#x}", byte);
		}
		self.finish(timer);
		Ok(())
	}

	/// Drops the frame state and goes back to waiting for a start edge.
	fn finish<T: CaptureCompareTimer>(&mut self, timer: &mut T) {
		self.frame = RxFrame::default();
		self.receiving = false;
		self.has_room = false;
		timer.disable(Event::SampleTick);
		timer.clear_pending(Event::StartEdge);
		timer.arm_capture();
		timer.enable(Event::StartEdge);
	}
}
