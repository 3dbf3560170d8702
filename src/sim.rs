//! In-process stand-in for the PRUs.
//!
//! Each started unit runs a thread that behaves like the ws281x PRU program: it reports
//! itself alive, accepts start commands, "clocks out" the frame by copying it, then writes
//! its response and raises the host interrupt. Everything it does is recorded so tests can
//! check the order of the handshake.

use std::{
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
		Arc,
		Condvar,
		Mutex,
		MutexGuard,
		PoisonError,
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use ledscape_shared::{
	BYTES_PER_PIXEL,
	COMMAND_ABORT,
	COMMAND_COMMAND_OFFSET,
	COMMAND_FRAME_ADDRESS_OFFSET,
	COMMAND_IDLE,
	COMMAND_NUM_PIXELS_OFFSET,
	COMMAND_RESPONSE_OFFSET,
	COMMAND_START,
	DEFAULT_SHARED_MEMORY_SIZE,
	GPIO_BANKS,
	MAX_STRIPS,
	PRU_DATA_RAM_SIZE,
};
use tracing::{debug, warn};

use crate::{
	error::RuntimeError,
	memory::MemoryRegion,
	runtime::{CoprocessorContext, CoprocessorRuntime},
};

const IDLE_POLL: Duration = Duration::from_micros(50);
/// What uninitialized data RAM reads as.
const GARBAGE: u32 = 0xdead_beef;

#[derive(Debug, Clone)]
pub struct SimConfig {
	pub units:          usize,
	pub shared_size:    usize,
	/// Address of the shared memory as the simulated PRUs see it.
	pub shared_address: u32,
	pub transfer_delay: Duration,
}

impl Default for SimConfig {
	fn default() -> Self {
		Self {
			units:          2,
			shared_size:    DEFAULT_SHARED_MEMORY_SIZE,
			shared_address: 0x9c94_0000,
			transfer_delay: Duration::from_millis(1),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
	Init { unit: usize },
	ConfigureGpio {
		bank:    usize,
		pin:     u8,
		output:  bool,
		initial: bool,
	},
	StartProgram { unit: usize, program: PathBuf },
	Alive { unit: usize },
	Accepted { unit: usize, frame_address: u32 },
	Completed { unit: usize },
	Aborted { unit: usize },
	Teardown { unit: usize },
}

#[derive(Default)]
struct UnitState {
	live:       AtomicBool,
	stop:       AtomicBool,
	held:       AtomicBool,
	silent:     AtomicBool,
	fail_init:  AtomicBool,
	fail_start: AtomicBool,
	transfers:  AtomicUsize,
	last_frame: Mutex<Option<Vec<u8>>>,
	worker:     Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
	config:         SimConfig,
	data:           Vec<Box<[AtomicU32]>>,
	shared:         Box<[AtomicU32]>,
	units:          Vec<UnitState>,
	events:         Mutex<Vec<SimEvent>>,
	violations:     Mutex<Vec<String>>,
	transfer_delay: Mutex<Duration>,
	interrupts:     Mutex<u64>,
	interrupt:      Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn words(bytes: usize) -> Box<[AtomicU32]> {
	(0..bytes.div_ceil(4)).map(|_| AtomicU32::new(0)).collect()
}

fn region(words: &[AtomicU32], len: usize) -> MemoryRegion {
	// SAFETY: the words live in `Inner` which every holder of the region keeps alive, and
	// are only ever accessed through atomics or volatile reads and writes
	unsafe { MemoryRegion::from_raw_parts(words.as_ptr() as *mut u8, len) }
		.unwrap_or_else(|| unreachable!("boxed words are non-null and aligned"))
}

impl Inner {
	fn log(&self, event: SimEvent) {
		lock(&self.events).push(event);
	}

	fn violation(&self, message: String) {
		warn!("{message}");
		lock(&self.violations).push(message);
	}

	fn raise_interrupt(&self) {
		*lock(&self.interrupts) += 1;
		self.interrupt.notify_all();
	}

	fn data_region(&self, unit: usize) -> MemoryRegion {
		region(&self.data[unit], PRU_DATA_RAM_SIZE)
	}

	fn shared_region(&self) -> MemoryRegion {
		region(&self.shared, self.config.shared_size)
	}

	fn unit(&self, unit: usize) -> Result<&UnitState, RuntimeError> {
		self.units.get(unit).ok_or_else(|| RuntimeError::Unit {
			unit,
			message: format!("no such PRU, have {}", self.units.len()),
		})
	}

	fn run(&self, unit: usize) {
		let state = &self.units[unit];
		let data = self.data_region(unit);

		if !state.silent.load(Ordering::Acquire) {
			data.store_u32(COMMAND_RESPONSE_OFFSET, 1);
			self.log(SimEvent::Alive { unit });
			self.raise_interrupt();
		}

		loop {
			// an abort written before teardown must still be seen
			let stopping = state.stop.load(Ordering::Acquire);
			match data.load_u32(COMMAND_COMMAND_OFFSET) {
				COMMAND_ABORT => {
					self.log(SimEvent::Aborted { unit });
					break;
				}
				_ if stopping => break,
				COMMAND_START if !state.held.load(Ordering::Acquire) && !state.silent.load(Ordering::Acquire) => {
					self.transfer(unit, &data);
				}
				_ => thread::sleep(IDLE_POLL),
			}
		}
		debug!(unit, "simulated PRU halted");
	}

	fn transfer(&self, unit: usize, data: &MemoryRegion) {
		let state = &self.units[unit];
		let frame_address = data.load_u32(COMMAND_FRAME_ADDRESS_OFFSET);
		let num_pixels = data.load_u32(COMMAND_NUM_PIXELS_OFFSET) as usize;

		if data.load_u32(COMMAND_RESPONSE_OFFSET) != 0 {
			self.violation(format!("unit {unit}: start requested without clearing the response"));
		}

		data.store_u32(COMMAND_COMMAND_OFFSET, COMMAND_IDLE);
		self.log(SimEvent::Accepted { unit, frame_address });

		let offset = frame_address.wrapping_sub(self.config.shared_address) as usize;
		// rows are always MAX_STRIPS wide, whatever the host addresses
		let len = num_pixels * MAX_STRIPS * BYTES_PER_PIXEL;
		match self.shared_region().subregion(offset, len) {
			Some(frame) => {
				let mut bytes = vec![0; len];
				frame.read_bytes(0, &mut bytes);
				*lock(&state.last_frame) = Some(bytes);
			}
			None => self.violation(format!(
				"unit {unit}: frame of {len} bytes at {frame_address:#010x} is outside shared memory"
			)),
		}

		let delay = *lock(&self.transfer_delay);
		let until = Instant::now() + delay;
		while Instant::now() < until {
			if state.stop.load(Ordering::Acquire) {
				return;
			}
			thread::sleep(IDLE_POLL.min(delay));
		}

		state.transfers.fetch_add(1, Ordering::AcqRel);
		data.store_u32(COMMAND_RESPONSE_OFFSET, 1);
		self.log(SimEvent::Completed { unit });
		self.raise_interrupt();
	}
}

/// Simulated PRU runtime. Clones share the same simulated hardware.
#[derive(Clone)]
pub struct SimRuntime {
	inner: Arc<Inner>,
}

impl SimRuntime {
	pub fn new(config: SimConfig) -> Self {
		let inner = Inner {
			data: (0..config.units).map(|_| words(PRU_DATA_RAM_SIZE)).collect(),
			shared: words(config.shared_size),
			units: (0..config.units).map(|_| UnitState::default()).collect(),
			events: Mutex::default(),
			violations: Mutex::default(),
			transfer_delay: Mutex::new(config.transfer_delay),
			interrupts: Mutex::new(0),
			interrupt: Condvar::new(),
			config,
		};

		Self { inner: Arc::new(inner) }
	}

	pub fn config(&self) -> &SimConfig {
		&self.inner.config
	}

	pub fn events(&self) -> Vec<SimEvent> {
		lock(&self.inner.events).clone()
	}

	/// Handshake rules the host broke, as seen from the PRU side.
	pub fn violations(&self) -> Vec<String> {
		lock(&self.inner.violations).clone()
	}

	/// Contexts handed out by `init` and not yet torn down.
	pub fn live_units(&self) -> usize {
		self.inner
			.units
			.iter()
			.filter(|state| state.live.load(Ordering::Acquire))
			.count()
	}

	/// Frames a unit has finished clocking out.
	pub fn transfers(&self, unit: usize) -> usize {
		self.inner.units[unit].transfers.load(Ordering::Acquire)
	}

	/// The frame bytes a unit read for its most recent transfer.
	pub fn last_frame(&self, unit: usize) -> Option<Vec<u8>> {
		lock(&self.inner.units[unit].last_frame).clone()
	}

	/// A held unit leaves start commands pending instead of accepting them.
	pub fn hold(&self, unit: usize, held: bool) {
		self.inner.units[unit].held.store(held, Ordering::Release);
	}

	/// A silent unit runs but never responds, like a PRU with broken firmware.
	pub fn silence(&self, unit: usize) {
		self.inner.units[unit].silent.store(true, Ordering::Release);
	}

	pub fn fail_init(&self, unit: usize) {
		self.inner.units[unit].fail_init.store(true, Ordering::Release);
	}

	pub fn fail_start(&self, unit: usize) {
		self.inner.units[unit].fail_start.store(true, Ordering::Release);
	}

	pub fn set_transfer_delay(&self, delay: Duration) {
		*lock(&self.inner.transfer_delay) = delay;
	}

	/// Raw words of a unit's command block.
	pub fn command_block(&self, unit: usize) -> [u32; 4] {
		let data = &self.inner.data[unit];
		[0, 1, 2, 3].map(|i| data[i].load(Ordering::Acquire))
	}
}

impl CoprocessorRuntime for SimRuntime {
	fn init(&mut self, unit: usize) -> Result<CoprocessorContext, RuntimeError> {
		let state = self.inner.unit(unit)?;
		if state.fail_init.load(Ordering::Acquire) {
			return Err(RuntimeError::Unit {
				unit,
				message: "failed to map data memory".into(),
			});
		}

		for word in self.inner.data[unit].iter() {
			word.store(GARBAGE, Ordering::Relaxed);
		}
		state.live.store(true, Ordering::Release);
		self.inner.log(SimEvent::Init { unit });

		Ok(CoprocessorContext {
			unit,
			data_memory: self.inner.data_region(unit),
			shared_memory: self.inner.shared_region(),
			shared_address: self.inner.config.shared_address,
		})
	}

	fn configure_gpio(&mut self, bank: usize, pin: u8, output: bool, initial: bool) -> Result<(), RuntimeError> {
		if bank >= GPIO_BANKS.len() || pin >= 32 {
			return Err(RuntimeError::Io(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				format!("no gpio{bank}_{pin}"),
			)));
		}

		self.inner.log(SimEvent::ConfigureGpio {
			bank,
			pin,
			output,
			initial,
		});
		Ok(())
	}

	fn start_program(&mut self, context: &CoprocessorContext, program: &Path) -> Result<(), RuntimeError> {
		let unit = context.unit;
		let state = self.inner.unit(unit)?;
		if state.fail_start.load(Ordering::Acquire) {
			return Err(RuntimeError::Unit {
				unit,
				message: format!("failed to load {}", program.display()),
			});
		}

		self.inner.log(SimEvent::StartProgram {
			unit,
			program: program.to_path_buf(),
		});

		state.stop.store(false, Ordering::Release);
		let inner = Arc::clone(&self.inner);
		let worker = thread::Builder::new()
			.name(format!("pru{unit}"))
			.spawn(move || inner.run(unit))?;
		*lock(&state.worker) = Some(worker);

		Ok(())
	}

	fn wait_for_interrupt(&self, timeout: Option<Duration>) -> Result<bool, RuntimeError> {
		let mut pending = lock(&self.inner.interrupts);
		match timeout {
			None => {
				while *pending == 0 {
					pending = self
						.inner
						.interrupt
						.wait(pending)
						.unwrap_or_else(PoisonError::into_inner);
				}
			}
			Some(timeout) => {
				let (guard, _) = self
					.inner
					.interrupt
					.wait_timeout_while(pending, timeout, |pending| *pending == 0)
					.unwrap_or_else(PoisonError::into_inner);
				pending = guard;
				if *pending == 0 {
					return Ok(false);
				}
			}
		}

		*pending = 0;
		Ok(true)
	}

	fn teardown(&mut self, context: CoprocessorContext) {
		let unit = context.unit;
		let Some(state) = self.inner.units.get(unit) else {
			return;
		};

		state.stop.store(true, Ordering::Release);
		if let Some(worker) = lock(&state.worker).take() {
			if worker.join().is_err() {
				warn!(unit, "simulated PRU thread panicked");
			}
		}
		state.live.store(false, Ordering::Release);
		self.inner.log(SimEvent::Teardown { unit });
	}
}
