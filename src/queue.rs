//! Fixed-capacity byte ring shared between the application and the interrupt handler.

/// Ring buffer of `N` bytes.
///
/// `N` must be a power of two between 16 and 128 so index wraparound is a mask instead of
/// a division inside the interrupt path.
#[derive(Debug)]
pub struct ByteQueue<const N: usize> {
	buf: [u8; N],
	head: usize,
	tail: usize,
	pending: usize,
}

impl<const N: usize> ByteQueue<N> {
	const MASK: usize = {
		assert!(
			N.is_power_of_two() && N >= 16 && N <= 128,
			"queue capacity must be 16, 32, 64 or 128"
		);
		N - 1
	};

	pub const fn new() -> Self {
		let _ = Self::MASK;
		ByteQueue {
			buf: [0; N],
			head: 0,
			tail: 0,
			pending: 0,
		}
	}

	/// Appends `byte`, or returns `false` when the queue is full.
	pub fn try_enqueue(&mut self, byte: u8) -> bool {
		if self.pending == N {
			return false;
		}
		self.buf[self.tail] = byte;
		self.tail = (self.tail + 1) & Self::MASK;
		self.pending += 1;
		true
	}

	pub fn dequeue(&mut self) -> Option<u8> {
		let byte = self.peek()?;
		self.head = (self.head + 1) & Self::MASK;
		self.pending -= 1;
		Some(byte)
	}

	/// Oldest byte, left in place.
	pub fn peek(&self) -> Option<u8> {
		if self.pending == 0 {
			None
		}
		else {
			Some(self.buf[self.head])
		}
	}

	pub fn len(&self) -> usize { self.pending }

	pub fn is_empty(&self) -> bool { self.pending == 0 }

	pub fn is_full(&self) -> bool { self.pending == N }

	pub const fn capacity(&self) -> usize { N }

	/// Rewinds both indices to slot zero. Only done once the queue has drained.
	pub fn rewind(&mut self) {
		if self.pending == 0 {
			self.head = 0;
			self.tail = 0;
		}
	}
}

impl<const N: usize> Default for ByteQueue<N> {
	fn default() -> Self { Self::new() }
}
