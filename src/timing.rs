//! Baud rate to timer tick conversion.

/// Largest bit period, in prescaled timer ticks, the engine accepts.
pub const MAX_TICKS_PER_BIT: u16 = 499;

/// Largest divisor the 16-bit prescaler register can hold (`PSC = prescaler - 1`).
pub const MAX_PRESCALER: u32 = 65_536;

/// The requested baud rate cannot be represented within the timer's counting range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBaudRate;

/// Line and clock settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
	/// Bits per second on the line
	pub baudrate: u32,
	/// Timer input clock before prescaling
	pub clock_hz: u32,
	/// Counter limit for one bit period after prescaling
	pub max_ticks_per_bit: u16,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			baudrate: 9600,
			clock_hz: 8_000_000,
			max_ticks_per_bit: MAX_TICKS_PER_BIT,
		}
	}
}

/// Timer settings derived from a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudTiming {
	/// Prescaled ticks in one bit period
	pub ticks_per_bit: u16,
	/// Delay from a start edge to the middle of data bit 0
	pub one_and_half_bit_ticks: u16,
	/// Clock divisor applied before the counter
	pub prescaler: u32,
}

impl BaudTiming {
	/// Picks the smallest prescaler that brings one bit period under `max_ticks_per_bit`.
	///
	/// The half-bit offset is truncated, not rounded.
	pub fn new(baudrate: u32, clock_hz: u32, max_ticks_per_bit: u16) -> Result<Self, InvalidBaudRate> {
		if baudrate == 0 {
			return Err(InvalidBaudRate);
		}
		let raw_divisor = clock_hz / baudrate;
		let max = u32::from(max_ticks_per_bit);

		// smallest p with raw_divisor / p <= max
		let prescaler = raw_divisor / (max + 1) + 1;
		if prescaler > MAX_PRESCALER {
			return Err(InvalidBaudRate);
		}

		let ticks = raw_divisor / prescaler;
		if ticks == 0 || ticks > max {
			return Err(InvalidBaudRate);
		}

		// the first-sample offset is a 16-bit count as well
		let one_and_half = ticks + ticks / 2;
		if one_and_half > u32::from(u16::MAX) {
			return Err(InvalidBaudRate);
		}

		Ok(BaudTiming {
			ticks_per_bit: ticks as u16,
			one_and_half_bit_ticks: one_and_half as u16,
			prescaler,
		})
	}

	pub fn from_config(config: &Config) -> Result<Self, InvalidBaudRate> {
		Self::new(config.baudrate, config.clock_hz, config.max_ticks_per_bit)
	}

	/// Length of one bit on the line for the given timer input clock, `None` for a 0 Hz clock.
	pub fn bit_period_ns(&self, clock_hz: u32) -> Option<u64> {
		let clocks = u64::from(self.ticks_per_bit) * u64::from(self.prescaler);
		(clocks * 1_000_000_000).checked_div(u64::from(clock_hz))
	}
}
