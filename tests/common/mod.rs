//! Cycle-level model of a 16-bit capture/compare timer wired to a TX and an RX line.
//!
//! Every `step` advances the counter by one prescaled tick. Compare matches latch their
//! pending flag whether or not the source is enabled, the TX channel applies its armed
//! level on a match, and the capture channel latches the counter on a falling RX edge.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::digital::v2::InputPin;
use timer_serial::{CaptureCompareTimer, Config, Event, Level, Pins, SharedSerial, SoftSerial};

/// 16 ticks per bit, 24 to the middle of data bit 0.
pub const TICKS_PER_BIT: u16 = 16;

pub fn fast_config() -> Config {
	Config {
		baudrate: 100_000,
		clock_hz: 1_600_000,
		..Config::default()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
	Forced,
	OnMatch(Level),
}

#[derive(Debug)]
pub struct State {
	pub counter: u16,
	pub prescaler: u32,
	pub running: bool,
	compare: [u16; 3],
	pub capture: u16,
	pub pending: [bool; 3],
	pub enabled: [bool; 3],
	pub irq_masked: bool,
	output_mode: OutputMode,
	output_level: Level,
	pub output_connected: bool,
	pub capture_armed: bool,
	pub capture_falling: bool,
	/// RX follows TX when set, `external_rx` otherwise
	pub loopback: bool,
	pub external_rx: Level,
	last_rx: Level,
	pub fail_reads: bool,
	/// TX line level after every step
	pub tx_trace: Vec<Level>,
}

fn slot(event: Event) -> usize {
	match event {
		Event::StartEdge => 0,
		Event::SampleTick => 1,
		Event::BitTick => 2,
	}
}

impl State {
	fn new() -> Self {
		State {
			counter: 0,
			prescaler: 0,
			running: false,
			compare: [0; 3],
			capture: 0,
			pending: [false; 3],
			enabled: [false; 3],
			irq_masked: true,
			output_mode: OutputMode::Forced,
			output_level: Level::High,
			output_connected: false,
			capture_armed: false,
			capture_falling: false,
			loopback: true,
			external_rx: Level::High,
			last_rx: Level::High,
			fail_reads: false,
			tx_trace: Vec::new(),
		}
	}

	pub fn tx_line(&self) -> Level {
		if self.output_connected {
			self.output_level
		}
		else {
			Level::High
		}
	}

	pub fn rx_line(&self) -> Level {
		if self.loopback {
			self.tx_line()
		}
		else {
			self.external_rx
		}
	}

	pub fn is_pending(&self, event: Event) -> bool { self.pending[slot(event)] }

	pub fn is_enabled(&self, event: Event) -> bool { self.enabled[slot(event)] }

	pub fn set_pending(&mut self, event: Event) { self.pending[slot(event)] = true; }

	fn step(&mut self) {
		if !self.running {
			return;
		}
		self.counter = self.counter.wrapping_add(1);

		if self.counter == self.compare[slot(Event::BitTick)] {
			self.pending[slot(Event::BitTick)] = true;
			if let OutputMode::OnMatch(level) = self.output_mode {
				self.output_level = level;
			}
		}
		if self.counter == self.compare[slot(Event::SampleTick)] {
			self.pending[slot(Event::SampleTick)] = true;
		}

		let tx = self.tx_line();
		self.tx_trace.push(tx);

		let rx = self.rx_line();
		let falling = self.last_rx == Level::High && rx == Level::Low;
		if self.capture_armed && self.capture_falling && falling {
			self.capture = self.counter;
			self.pending[slot(Event::StartEdge)] = true;
		}
		self.last_rx = rx;
	}

	fn irq_line(&self) -> bool {
		!self.irq_masked && (0..3).any(|i| self.pending[i] && self.enabled[i])
	}
}

#[derive(Debug, Clone)]
pub struct Sim(Arc<Mutex<State>>);

impl Sim {
	pub fn new() -> Self { Sim(Arc::new(Mutex::new(State::new()))) }

	pub fn state(&self) -> MutexGuard<'_, State> { self.0.lock().unwrap() }

	pub fn timer(&self) -> SimTimer { SimTimer(self.0.clone()) }

	pub fn pins(&self) -> SimPins { Pins::new(SimTx, SimRx(self.0.clone())) }

	pub fn step(&self) { self.state().step(); }

	pub fn irq_line(&self) -> bool { self.state().irq_line() }

	/// Switches RX from the loopback wire to a line the test drives itself.
	pub fn detach_rx(&self) {
		let mut state = self.state();
		state.loopback = false;
		state.external_rx = Level::High;
	}

	pub fn set_rx(&self, level: Level) { self.state().external_rx = level; }

	pub fn tx_trace(&self) -> Vec<Level> { self.state().tx_trace.clone() }
}

pub type SimPins = Pins<SimTx, SimRx>;

pub type TestSerial = SoftSerial<SimTimer, SimPins, 16, 16>;

pub fn setup() -> (Sim, TestSerial) {
	let sim = Sim::new();
	let serial = SoftSerial::initialize(sim.timer(), sim.pins(), &fast_config()).unwrap();
	(sim, serial)
}

pub type TestShared = SharedSerial<SimTimer, SimPins, 16, 16>;

pub fn setup_shared() -> (Sim, TestShared) {
	let (sim, serial) = setup();
	let shared = SharedSerial::new();
	assert!(shared.install(serial).is_none());
	(sim, shared)
}

/// Same as [`run`], through the shared handle.
pub fn service(sim: &Sim, shared: &TestShared, ticks: u32) {
	for _ in 0..ticks {
		sim.step();
		if sim.irq_line() {
			shared.on_timer_event().unwrap();
		}
	}
}

/// Runs `ticks` timer ticks, servicing the interrupt whenever it is raised.
pub fn run<const TX: usize, const RX: usize>(
	sim: &Sim,
	serial: &mut SoftSerial<SimTimer, SimPins, TX, RX>,
	ticks: u32,
) {
	for _ in 0..ticks {
		sim.step();
		if sim.irq_line() {
			serial.on_timer_event().unwrap();
		}
	}
}

/// Runs whole bit periods.
pub fn run_bits<const TX: usize, const RX: usize>(
	sim: &Sim,
	serial: &mut SoftSerial<SimTimer, SimPins, TX, RX>,
	bits: u32,
) {
	run(sim, serial, bits * u32::from(TICKS_PER_BIT));
}

/// Line levels of one frame: start, data LSB first, stop.
pub fn frame_levels(byte: u8, stop: Level) -> [Level; 10] {
	let mut levels = [Level::Low; 10];
	for i in 0..8 {
		levels[i + 1] = Level::from(byte & (1 << i) != 0);
	}
	levels[9] = stop;
	levels
}

/// Drives one frame onto the detached RX line, then leaves the line idle high.
pub fn send_frame<const TX: usize, const RX: usize>(
	sim: &Sim,
	serial: &mut SoftSerial<SimTimer, SimPins, TX, RX>,
	byte: u8,
	stop: Level,
) {
	for level in frame_levels(byte, stop).iter() {
		sim.set_rx(*level);
		run_bits(sim, serial, 1);
	}
	sim.set_rx(Level::High);
	run_bits(sim, serial, 1);
}

/// Decodes frames from a TX trace by sampling the middle of every bit, starting at each
/// falling edge found on an idle line.
pub fn decode_trace(trace: &[Level]) -> Vec<u8> {
	let bit = usize::from(TICKS_PER_BIT);
	let mut bytes = Vec::new();
	let mut i = 1;
	while i < trace.len() {
		if trace[i - 1] == Level::High && trace[i] == Level::Low {
			if i + 10 * bit > trace.len() {
				break;
			}
			let mut byte = 0u8;
			for b in 0..8 {
				if trace[i + (b + 1) * bit + bit / 2] == Level::High {
					byte |= 1 << b;
				}
			}
			assert_eq!(trace[i + 9 * bit + bit / 2], Level::High, "stop bit low");
			bytes.push(byte);
			i += 10 * bit;
		}
		else {
			i += 1;
		}
	}
	bytes
}

#[derive(Debug)]
pub struct SimTx;

#[derive(Debug)]
pub struct SimRx(Arc<Mutex<State>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinError;

impl InputPin for SimRx {
	type Error = PinError;

	fn is_high(&self) -> Result<bool, PinError> {
		let state = self.0.lock().unwrap();
		if state.fail_reads {
			return Err(PinError);
		}
		Ok(state.rx_line() == Level::High)
	}

	fn is_low(&self) -> Result<bool, PinError> { self.is_high().map(|high| !high) }
}

#[derive(Debug)]
pub struct SimTimer(Arc<Mutex<State>>);

impl SimTimer {
	fn state(&self) -> MutexGuard<'_, State> { self.0.lock().unwrap() }
}

impl CaptureCompareTimer for SimTimer {
	fn set_prescaler(&mut self, prescaler: u32) { self.state().prescaler = prescaler; }

	fn start(&mut self) { self.state().running = true; }

	fn now(&self) -> u16 { self.state().counter }

	fn schedule(&mut self, event: Event, at: u16) { self.state().compare[slot(event)] = at; }

	fn compare(&self, event: Event) -> u16 { self.state().compare[slot(event)] }

	fn captured(&self) -> u16 { self.state().capture }

	fn is_pending(&self, event: Event) -> bool { self.state().pending[slot(event)] }

	fn clear_pending(&mut self, event: Event) { self.state().pending[slot(event)] = false; }

	fn enable(&mut self, event: Event) { self.state().enabled[slot(event)] = true; }

	fn disable(&mut self, event: Event) { self.state().enabled[slot(event)] = false; }

	fn is_enabled(&self, event: Event) -> bool { self.state().enabled[slot(event)] }

	fn set_output_on_match(&mut self, level: Level) { self.state().output_mode = OutputMode::OnMatch(level); }

	fn force_output(&mut self, level: Level) {
		let mut state = self.state();
		state.output_mode = OutputMode::Forced;
		state.output_level = level;
	}

	fn connect_output(&mut self) { self.state().output_connected = true; }

	fn release_output(&mut self) { self.state().output_connected = false; }

	fn capture_falling_edges(&mut self) { self.state().capture_falling = true; }

	fn arm_capture(&mut self) { self.state().capture_armed = true; }

	fn disarm_capture(&mut self) { self.state().capture_armed = false; }

	fn unmask_interrupt(&mut self) { self.state().irq_masked = false; }

	fn mask_interrupt(&mut self) { self.state().irq_masked = true; }
}
