//! Byte-to-bitstream state machine clocked by the TX compare channel.
//!
//! Each bit tick arms the level the channel drives at the *next* compare match, so the line
//! changes exactly on tick boundaries no matter how late the interrupt is serviced. A frame
//! takes ten ticks: the first asserts the start bit, the next eight the data bits (LSB
//! first), and the tenth asserts the stop bit and completes the frame.

use crate::hal::{CaptureCompareTimer, Event, Level};
use crate::queue::ByteQueue;
use crate::timing::BaudTiming;

/// Slot of the stop bit in [`TxFrame::bits`].
const STOP_BIT: usize = 8;

/// Bits of the byte on the wire, data LSB first then the stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TxFrame {
	bits: [Level; 9],
	position: u8,
}

impl TxFrame {
	pub(crate) fn new(byte: u8) -> Self {
		let mut bits = [Level::High; 9];
		for (i, bit) in bits[..STOP_BIT].iter_mut().enumerate() {
			*bit = Level::from(byte & (1 << i) != 0);
		}
		TxFrame { bits, position: 0 }
	}

	/// Next level to arm, or `None` once the stop bit has been armed.
	fn next_level(&mut self) -> Option<Level> {
		let level = *self.bits.get(usize::from(self.position))?;
		self.position += 1;
		Some(level)
	}
}

#[derive(Debug)]
pub(crate) struct Transmitter {
	frame: TxFrame,
	active: bool,
}

impl Transmitter {
	pub(crate) const fn new() -> Self {
		Transmitter {
			frame: TxFrame {
				bits: [Level::High; 9],
				position: 0,
			},
			active: false,
		}
	}

	/// Bit ticks are enabled and a frame is on the line.
	pub(crate) fn is_active(&self) -> bool { self.active }

	/// Starts sending `byte` from idle. The start bit is armed here and appears on the
	/// line one bit period from now.
	pub(crate) fn prime<T: CaptureCompareTimer>(&mut self, timer: &mut T, byte: u8, timing: &BaudTiming) {
		self.frame = TxFrame::new(byte);
		timer.clear_pending(Event::BitTick);
		timer.set_output_on_match(Level::Low);
		timer.connect_output();
		let first = timer.now().wrapping_add(timing.ticks_per_bit);
		timer.schedule(Event::BitTick, first);
		timer.enable(Event::BitTick);
		self.active = true;
	}

	pub(crate) fn on_bit_tick<T: CaptureCompareTimer, const N: usize>(
		&mut self,
		timer: &mut T,
		queue: &mut ByteQueue<N>,
		timing: &BaudTiming,
	) {
		timer.clear_pending(Event::BitTick);
		let next = timer.compare(Event::BitTick).wrapping_add(timing.ticks_per_bit);
		timer.schedule(Event::BitTick, next);

		if let Some(level) = self.frame.next_level() {
			timer.set_output_on_match(level);
			return;
		}

		// stop bit is on the line now, the byte is done
		queue.dequeue();
		match queue.peek() {
			Some(byte) => {
				self.frame = TxFrame::new(byte);
				timer.set_output_on_match(Level::Low);
			}
			None => {
				timer.disable(Event::BitTick);
				timer.force_output(Level::High);
				timer.release_output();
				queue.rewind();
				self.active = false;
			}
		}
	}
}
